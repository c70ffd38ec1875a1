use anyhow::{Context, Result};
use clap::Parser;
use garden_rover::mission::MissionEvent;
use garden_rover::simulation::RoverSimulation;
use log::{debug, error, info, trace, warn};
use rover_common::{MissionStatus, RoverConfig, Snapshot};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the rover runner
#[derive(Parser, Debug)]
#[command(author, version, about = "Headless garden rover mission runner", long_about = None)]
struct Args {
    /// Path to the config.toml file (defaults are used when omitted and ./config.toml is absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in garden template to load, overriding the config
    #[arg(short, long)]
    template: Option<String>,

    /// Tick budget, overriding timing.max_ticks
    #[arg(long)]
    max_ticks: Option<u32>,

    /// Base filename for output files, overriding output.base_filename
    #[arg(short, long)]
    output: Option<String>,

    /// List the built-in templates and exit
    #[arg(long)]
    list_templates: bool,
}

fn load_config(args: &Args) -> Result<RoverConfig> {
    let mut config = match &args.config {
        Some(path) => RoverConfig::load(path)?,
        None if Path::new("config.toml").exists() => RoverConfig::load("config.toml")?,
        None => {
            warn!("No config.toml found; using built-in defaults.");
            RoverConfig::default()
        }
    };

    if let Some(template) = &args.template {
        config.mission.template = Some(template.clone());
        config.mission.random_garden = None;
    }
    if let Some(max_ticks) = args.max_ticks {
        config.timing.max_ticks = max_ticks;
    }
    if let Some(output) = &args.output {
        config.output.base_filename = output.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    if args.list_templates {
        for t in garden_rover::templates::all_templates() {
            println!("{:<16} {:?}  {}", t.id, t.difficulty, t.description);
        }
        return Ok(());
    }

    info!("Starting garden rover runner...");

    // --- Load Configuration ---
    let config = load_config(&args)?;

    // --- Initialize Session ---
    let mut sim = RoverSimulation::new(config).context("Failed to create rover session")?;
    sim.apply_mission_config().context("Failed to apply mission configuration")?;
    info!(
        "World {}x{} with {} plants; route of {} waypoints.",
        sim.grid().size(),
        sim.grid().size(),
        sim.grid().plant_count(),
        sim.mission().waypoints().len()
    );

    let has_start_pose = sim.config().mission.start_pose.is_some();
    let start_result = if has_start_pose {
        let pose = *sim.pose();
        sim.start_mission_from(pose)
    } else {
        sim.start_mission()
    };
    if let Err(e) = start_result {
        error!("Cannot start mission: {}", e);
        anyhow::bail!("Mission did not start: {}", e);
    }

    // --- Mission Loop ---
    let max_ticks = sim.config().timing.max_ticks;
    info!("Running mission for at most {} ticks ({:.1} s simulated).", max_ticks, max_ticks as f32 * sim.params().dt);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    for tick in 0..max_ticks {
        let events = sim.tick();
        for event in &events {
            match event {
                MissionEvent::WaypointReached { index, coord } => {
                    debug!("Tick {}: waypoint {} at {}", tick + 1, index, coord)
                }
                MissionEvent::PlantScanned(scan) => trace!("Tick {}: scan {:?}", tick + 1, scan),
                MissionEvent::Completed { .. } => {}
            }
        }

        let now = Instant::now();
        if now.duration_since(previous_print_time).as_secs_f64() >= 5.0 {
            let pose = sim.pose();
            info!(
                "Tick [{}/{}] | pos ({:.2}, {:.2}) | v {:.2} | waypoint {}/{}",
                tick + 1,
                max_ticks,
                pose.position.x,
                pose.position.y,
                pose.velocity,
                sim.mission().state().waypoint_index,
                sim.mission().waypoints().len()
            );
            previous_print_time = now;
        }

        if sim.status() != MissionStatus::Running {
            break;
        }
    }
    if sim.status() == MissionStatus::Running {
        warn!("Tick budget exhausted before the mission completed.");
        sim.record_snapshot();
    }

    let summary = sim.summary();
    info!(
        "Mission {} after {} ticks in {:.3} s wall time: {:.2} units travelled, {}/{} plants scanned ({:.0}% coverage).",
        summary.status,
        summary.ticks,
        start_time.elapsed().as_secs_f64(),
        summary.distance_traveled,
        summary.plants_scanned,
        summary.plants_on_grid,
        summary.coverage_percent
    );

    // --- Save Recorded Data ---
    info!("Saving recorded data...");
    let output = sim.config().output.clone();
    if output.save_snapshots {
        let format = output.format.as_deref().unwrap_or("json");
        if let Err(e) = save_snapshots(sim.get_recorded_snapshots(), &output.base_filename, format) {
            error!("Error saving snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config.");
    }

    if output.save_trajectory {
        let filename = format!("{}_trajectory.csv", output.base_filename);
        save_trajectory(sim.get_recorded_snapshots(), &filename)?;
        info!("Trajectory saved to {}", filename);
    }

    if output.save_grid {
        let filename = format!("{}_grid.json", output.base_filename);
        let json = sim.grid().to_json()?;
        std::fs::write(&filename, json).with_context(|| format!("Failed to write '{}'", filename))?;
        info!("Final grid saved to {}", filename);
    }

    info!("Run complete.");
    Ok(())
}

fn save_snapshots(snapshots: &[Snapshot], base_filename: &str, format: &str) -> Result<()> {
    let format = match format {
        "json" | "bincode" | "messagepack" => format,
        other => {
            error!("Unknown output format: {}. Using JSON instead.", other);
            "json"
        }
    };
    let extension = match format {
        "bincode" => "bin",
        "messagepack" => "msgpack",
        _ => "json",
    };
    let filename = format!("{}_snapshots.{}", base_filename, extension);
    let file = File::create(&filename).with_context(|| format!("Error creating snapshot file '{}'", filename))?;
    let mut writer = BufWriter::new(file);

    match format {
        "bincode" => bincode::serialize_into(&mut writer, snapshots)?,
        "messagepack" => rmp_serde::encode::write(&mut writer, snapshots)?,
        _ => serde_json::to_writer(&mut writer, snapshots)?,
    }
    writer.flush()?;
    info!("{} snapshots saved to {} ({} format)", snapshots.len(), filename, format);
    Ok(())
}

fn save_trajectory(snapshots: &[Snapshot], filename: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename)
        .with_context(|| format!("Error creating trajectory file '{}'", filename))?;
    writer.write_record(["tick", "time_s", "x", "z", "heading_rad", "velocity", "waypoint_index", "distance"])?;
    for s in snapshots {
        writer.write_record(&[
            s.tick.to_string(),
            format!("{:.4}", s.time),
            format!("{:.4}", s.x),
            format!("{:.4}", s.z),
            format!("{:.4}", s.heading),
            format!("{:.4}", s.velocity),
            s.waypoint_index.to_string(),
            format!("{:.4}", s.distance_traveled),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
