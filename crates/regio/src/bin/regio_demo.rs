//! # REGIO Demo
//!
//! Walks through the allocator's public operations and prints arena dumps.
//!
//! Usage: `regio_demo [config.toml] [--content]`

use std::process::ExitCode;

use regio::{demo, ArenaConfig, DemoOptions};

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         REGIO ARENA ALLOCATOR DEMO                               ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let show_content = args.iter().any(|a| a == "--content");

    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => match ArenaConfig::from_toml_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ArenaConfig::default(),
    };

    println!(
        "Config: max_arena_size = {}, alignment = {}, merge_threshold = {}",
        config.max_arena_size, config.alignment, config.merge_threshold
    );
    println!();

    let options = DemoOptions {
        config,
        show_content,
    };
    let mut stdout = std::io::stdout().lock();
    match demo::run(&options, &mut stdout) {
        Ok(summary) => {
            println!(
                "Done: {} used / {} free after freeing, {} arena(s) after spill-over, {} rejected",
                summary.used_blocks,
                summary.free_blocks,
                summary.spill_arenas,
                summary.spill_rejected
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
