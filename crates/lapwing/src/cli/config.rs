use std::path::PathBuf;

use clap::Parser;

use crate::config::LapwingConfig;

#[derive(Parser, Debug)]
pub struct Args {
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(long)]
    pub dump: bool,

    #[arg(long)]
    pub dump_toml: bool,
}

pub fn execute(args: Args) -> anyhow::Result<()> {
    let config = LapwingConfig::from_file(&args.config)?;

    if args.dump {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else if args.dump_toml {
        println!("{}", toml::to_string_pretty(&config)?);
    } else {
        println!("✓ Configuration valid: {}", args.config.display());
        println!();
        println!("Timing:");
        println!("  Min lap time: {}ms", config.timing.min_lap_time_ms);
        println!("  Grace period: {}ms", config.timing.grace_period_ms);
        println!("  Liveness tick: {}ms", config.timing.liveness_tick_ms);
        println!();
        println!("Course:");
        println!("  Lap distance: {}m", config.course.lap_distance_m);
        println!("  Laps planned: {}", config.course.laps_planned);
        println!("  Total: {}m", config.course.distance_total_m());
        println!();
        println!("Snapshot: {}", config.snapshot.path.display());
        println!();
        println!("Roster: {} tags", config.roster.len());
        for entry in &config.roster {
            println!(
                "  - {} [{}]{}",
                entry.name,
                entry.address,
                if entry.in_race { "" } else { " (spectator)" }
            );
        }
    }

    Ok(())
}
