extern crate sap_broadphase as broadphase;

#[macro_use]
extern crate clap;

#[macro_use]
extern crate log;

use broadphase::{Layer, LayerBuilder, ObjectState, Polygon, Transform, YSweepMode};
use cgmath::{Point2, Rad, Vector2};

use rand::prelude::*;

use std::time::Duration;

type ID = u32;

struct Body {
    polygon: Polygon,
    transform: Transform,
    velocity: Vector2<f32>,
    spin: f32
}

struct SceneArgs {
    seed: u64,
    count: usize,
    extent: f32,
    radius: f32,
    ticks: usize,
    dt: f32
}

impl SceneArgs {
    fn args() -> Vec<clap::Arg<'static, 'static>> {
        use clap::Arg;
        vec![
            Arg::with_name("seed")
                .long("seed")
                .value_name("NUMBER")
                .help("initial state for the random number generator"),
            Arg::with_name("count")
                .short("n")
                .long("count")
                .value_name("NUMBER")
                .required(true)
                .help("number of polygons in the scene"),
            Arg::with_name("extent")
                .short("e")
                .long("extent")
                .value_name("SIZE")
                .default_value("1000")
                .help("side length of the square polygons are spawned in"),
            Arg::with_name("radius")
                .short("r")
                .long("radius")
                .value_name("SIZE")
                .default_value("4")
                .help("maximum distance of a vertex from its polygon's origin"),
            Arg::with_name("ticks")
                .short("t")
                .long("ticks")
                .value_name("NUMBER")
                .default_value("120")
                .help("number of ticks to simulate"),
            Arg::with_name("dt")
                .long("dt")
                .value_name("SECONDS")
                .default_value("0.016")
                .help("simulated time per tick")]
    }

    fn from_matches(args: &clap::ArgMatches) -> Self {
        Self{
            seed: value_t!(args, "seed", u64).unwrap_or(0),
            count: value_t!(args, "count", usize).unwrap_or_else(|err| err.exit()),
            extent: value_t!(args, "extent", f32).unwrap_or_else(|err| err.exit()),
            radius: value_t!(args, "radius", f32).unwrap_or_else(|err| err.exit()),
            ticks: value_t!(args, "ticks", usize).unwrap_or_else(|err| err.exit()),
            dt: value_t!(args, "dt", f32).unwrap_or_else(|err| err.exit())
        }
    }

    fn generate(&self) -> Vec<Body> {
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(self.seed);
        let radius = self.radius;
        (0..self.count)
            .map(|_| {
                let vertices = rng.gen_range(3, 9);
                let points: Vec<_> = (0..vertices)
                    .map(|_| Point2::new(rng.gen_range(-radius, radius), rng.gen_range(-radius, radius)))
                    .collect();
                Body{
                    polygon: Polygon::convex_hull(points),
                    transform: Transform::new(
                        Vector2::new(rng.gen_range(0f32, self.extent), rng.gen_range(0f32, self.extent)),
                        Rad(rng.gen_range(0f32, std::f32::consts::PI * 2f32))),
                    velocity: Vector2::new(rng.gen_range(-20f32, 20f32), rng.gen_range(-20f32, 20f32)),
                    spin: rng.gen_range(-1f32, 1f32)
                }
            })
            .collect()
    }
}

fn objects(bodies: &[Body]) -> Vec<ObjectState<ID>> {
    bodies.iter()
        .enumerate()
        .map(|(id, body)| ObjectState::new(id as ID, &body.polygon, body.transform))
        .collect()
}

fn step(bodies: &mut [Body], dt: f32) {
    for body in bodies.iter_mut() {
        body.transform.position += body.velocity * dt;
        body.transform.rotation = Rad(body.transform.rotation.0 + body.spin * dt);
    }
}

fn tick(layer: &mut Layer<ID>, objects: &[ObjectState<ID>], parallel: bool) -> usize {
    if parallel {
        layer.par_tick(objects).len()
    } else {
        layer.tick(objects).len()
    }
}

trait Command {
    fn name() -> &'static str;
    fn init() -> clap::App<'static, 'static>;
    fn exec(args: &clap::ArgMatches);
}

struct Run {}
impl Command for Run {
    fn name() -> &'static str { "run" }
    fn init() -> clap::App<'static, 'static> {
        use clap::Arg;
        clap::SubCommand::with_name(Self::name())
            .about("simulate a scene of moving polygons and print per-tick broadphase statistics")
            .args(&SceneArgs::args())
            .arg(Arg::with_name("y_sweep")
                .long("y-sweep")
                .possible_values(&["adaptive", "always", "never"])
                .default_value("adaptive")
                .help("when to refine X candidates on the Y axis"))
            .arg(Arg::with_name("threshold")
                .long("threshold")
                .value_name("RATIO")
                .default_value("2.0")
                .help("candidates per object above which the Y sweep is enabled"))
            .arg(Arg::with_name("hysteresis")
                .long("hysteresis")
                .value_name("TICKS")
                .default_value("5")
                .help("consecutive ticks across the threshold before toggling the Y sweep"))
            .arg(Arg::with_name("window")
                .long("window")
                .value_name("TICKS")
                .default_value("30")
                .help("ticks averaged by the density monitor"))
            .arg(Arg::with_name("full_sort")
                .long("full-sort")
                .help("re-sort endpoints from scratch every tick"))
            .arg(Arg::with_name("parallel")
                .long("parallel")
                .help("use the parallel tick"))
    }

    fn exec(args: &clap::ArgMatches) {
        let scene = SceneArgs::from_matches(args);
        let mode = match args.value_of("y_sweep") {
            Some("always") => YSweepMode::Always,
            Some("never") => YSweepMode::Never,
            _ => YSweepMode::Adaptive
        };
        let mut layer: Layer<ID> = LayerBuilder::new()
            .with_y_sweep(mode)
            .with_density_threshold(value_t!(args, "threshold", f32).unwrap_or_else(|err| err.exit()))
            .with_hysteresis_ticks(value_t!(args, "hysteresis", usize).unwrap_or_else(|err| err.exit()))
            .with_window_size(value_t!(args, "window", usize).unwrap_or_else(|err| err.exit()))
            .with_incremental_sort(!args.is_present("full_sort"))
            .with_object_capacity(scene.count)
            .build();
        let parallel = args.is_present("parallel");

        let mut bodies = scene.generate();
        let mut total = Duration::default();
        println!("{:>6} {:>8} {:>10} {:>8} {:>8} {:>10} {:>12}",
            "tick", "objects", "x_pairs", "ratio", "y_sweep", "emitted", "elapsed");
        for _ in 0..scene.ticks {
            let objects = objects(&bodies);
            tick(&mut layer, &objects, parallel);
            let stats = layer.stats();
            total += stats.elapsed;
            println!("{:>6} {:>8} {:>10} {:>8.3} {:>8} {:>10} {:>12?}",
                stats.tick,
                stats.objects - stats.excluded,
                stats.x_candidates,
                stats.activation_ratio,
                stats.y_sweep,
                stats.emitted,
                stats.elapsed);
            step(&mut bodies, scene.dt);
        }
        if scene.ticks > 0 {
            println!("mean tick: {:?}", total / scene.ticks as u32);
        }
    }
}

struct Compare {}
impl Command for Compare {
    fn name() -> &'static str { "compare" }
    fn init() -> clap::App<'static, 'static> {
        clap::SubCommand::with_name(Self::name())
            .about("time the same scene with the Y sweep always on and always off")
            .args(&SceneArgs::args())
    }

    fn exec(args: &clap::ArgMatches) {
        let scene = SceneArgs::from_matches(args);
        for &mode in &[YSweepMode::Never, YSweepMode::Always] {
            let mut layer: Layer<ID> = LayerBuilder::new()
                .with_y_sweep(mode)
                .with_object_capacity(scene.count)
                .build();
            let mut bodies = scene.generate();
            let mut total = Duration::default();
            let mut emitted = 0usize;
            for _ in 0..scene.ticks {
                let objects = objects(&bodies);
                emitted += tick(&mut layer, &objects, false);
                total += layer.stats().elapsed;
                step(&mut bodies, scene.dt);
            }
            let ticks = scene.ticks.max(1);
            println!("{:?}: mean tick {:?}, mean pairs {}", mode, total / ticks as u32, emitted / ticks);
        }
    }
}

macro_rules! app_cmds {
    (app $app: expr; $(cmd $cmd: ident)*) => {
        {
            let mut app = $app as clap::App;
            $(
                app = app.subcommand(<$cmd as Command>::init());
            )*
            let matches = app.get_matches();
            $(
                if let Some(matches) = matches.subcommand_matches(<$cmd as Command>::name()) {
                    <$cmd as Command>::exec(matches);
                }
            )*
        }
    };
}

fn main() {
    env_logger::init();
    info!("sap_stats {}", crate_version!());
    app_cmds!{
        app clap::App::new("sap_stats")
            .version(crate_version!());
        cmd Run
        cmd Compare
    };
}
