use std::cell::Cell;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hshg::config::{HshgConfig, SimulationConfig};
use hshg::metrics::BroadPhaseMetrics;
use hshg::util::vec2::Vec2;
use hshg::{Aabb, Collider, Hshg};

/// A box drifting around a walled world
#[derive(Debug)]
struct Particle {
    aabb: Cell<Aabb>,
    velocity: Cell<Vec2>,
    is_static: bool,
    contacts: Cell<u32>,
}

impl Particle {
    fn spawn(rng: &mut StdRng, sim: &SimulationConfig) -> Self {
        let half_world = sim.world_size * 0.5;
        let size = Vec2::new(
            rng.gen_range(sim.min_object_size..sim.max_object_size),
            rng.gen_range(sim.min_object_size..sim.max_object_size),
        );
        let min = Vec2::new(
            rng.gen_range(-half_world..half_world - size.x),
            rng.gen_range(-half_world..half_world - size.y),
        );
        let is_static = rng.gen_bool(f64::from(sim.static_fraction));
        let velocity = if is_static || sim.max_speed == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(
                rng.gen_range(-sim.max_speed..sim.max_speed),
                rng.gen_range(-sim.max_speed..sim.max_speed),
            )
        };

        Self {
            aabb: Cell::new(Aabb::from_min_size(min, size)),
            velocity: Cell::new(velocity),
            is_static,
            contacts: Cell::new(0),
        }
    }

    /// Advance one tick, reflecting off the world bounds
    fn step(&self, half_world: f32) {
        if self.is_static {
            return;
        }
        let mut velocity = self.velocity.get();
        let mut aabb = self.aabb.get().translated(velocity);

        if aabb.min().x < -half_world || aabb.max().x > half_world {
            velocity.x = -velocity.x;
            aabb = self.aabb.get().translated(velocity);
        }
        if aabb.min().y < -half_world || aabb.max().y > half_world {
            velocity.y = -velocity.y;
            aabb = self.aabb.get().translated(velocity);
        }

        self.velocity.set(velocity);
        self.aabb.set(aabb);
    }
}

impl Collider for Particle {
    fn aabb(&self) -> Aabb {
        self.aabb.get()
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn collided(&self, _other: &Self) {
        self.contacts.set(self.contacts.get() + 1);
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("hshg-sim v{}", env!("CARGO_PKG_VERSION"));

    let config = HshgConfig::load_or_default();
    let sim = SimulationConfig::load_or_default();
    sim.validate()?;
    info!(
        "Configuration loaded: objects={}, ticks={}, world={}, density={}, factor={}",
        sim.object_count, sim.ticks, sim.world_size,
        config.max_object_cell_density, config.hierarchy_factor
    );

    let mut index = Hshg::with_config(config)?;
    let metrics = BroadPhaseMetrics::new();
    let mut rng = StdRng::seed_from_u64(sim.seed);

    let started = Instant::now();
    for _ in 0..sim.object_count {
        index.add_object(Particle::spawn(&mut rng, &sim));
    }
    info!(
        "Indexed {} objects in {:?} across {} tiers",
        index.len(),
        started.elapsed(),
        index.tier_count()
    );
    debug!(cell_sizes = ?index.tier_cell_sizes(), "tier layout");

    let half_world = sim.world_size * 0.5;
    for tick in 1..=sim.ticks {
        for (_, particle) in index.iter() {
            particle.step(half_world);
        }

        let update_started = Instant::now();
        let rehashed = index.update();
        let update_time = update_started.elapsed();

        let query_started = Instant::now();
        let pairs = index.query_for_collision_pairs().len();
        let query_time = query_started.elapsed();

        metrics.record_tick(update_time, query_time, rehashed, pairs);

        if sim.stats_interval > 0 && tick % sim.stats_interval == 0 {
            let stats = index.stats();
            metrics.observe(&stats);
            info!(
                "tick {}: pairs={}, rehashed={}, tick_us={}",
                tick, pairs, rehashed, (update_time + query_time).as_micros()
            );
            debug!("stats: {}", serde_json::to_string(&stats)?);
        }
    }

    metrics.observe(&index.stats());
    let contacts: u64 = index.iter().map(|(_, p)| u64::from(p.contacts.get())).sum();
    info!(
        "Finished {} ticks in {:?}, {} contact notifications",
        sim.ticks,
        started.elapsed(),
        contacts
    );
    info!("Metrics:\n{}", metrics.to_json()?);

    Ok(())
}
