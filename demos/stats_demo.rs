use clap::Parser;
use swiss_hash::HashMap;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Fraction of slots filled before the map grows.
    #[arg(short = 'l', long = "load_factor", default_value_t = 0.875)]
    load_factor: f64,

    /// Percentage of the inserted keys to remove afterwards.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 0)]
    remove_percent: usize,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    println!(
        "Creating HashMap with target capacity {} and load factor {}",
        args.target_capacity, args.load_factor
    );

    let mut map: HashMap<u64, u64> =
        match HashMap::with_capacity_and_load_factor(args.target_capacity, args.load_factor) {
            Ok(map) => map,
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(2);
            }
        };

    println!(
        "Actual capacity: {} (max load {})",
        map.capacity(),
        map.max_load()
    );
    println!("Filling map up to its load limit...");

    let num_values = map.max_load() as u64;
    for value in 0..num_values {
        map.insert(value, value);
    }
    let capacity = map.capacity();

    let num_removed = num_values * args.remove_percent.min(100) as u64 / 100;
    for value in 0..num_removed {
        map.remove(&value);
    }

    println!(
        "Inserted {} values, removed {}, {} live",
        num_values,
        num_removed,
        map.len()
    );
    println!(
        "Final load factor: {:.2}%",
        (map.len() as f64 / map.capacity() as f64) * 100.0
    );
    if map.capacity() != capacity {
        println!("Map grew from {} to {} slots", capacity, map.capacity());
    }

    map.probe_histogram().print();
    map.debug_stats().print();
}
