//! Print an up-ramp and its matching down-ramp as DAC codes.
//!
//! Usage: `gen-ramp [start_mhz stop_mhz count]`
use std::process::ExitCode;

use vco_ramp::RampGenerator;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (start, stop, count) = match args.as_slice() {
        [] => (2258.0, 2588.0, 360),
        [start, stop, count] => {
            match (start.parse::<f32>(), stop.parse::<f32>(), count.parse::<usize>()) {
                (Ok(start), Ok(stop), Ok(count)) => (start, stop, count),
                _ => {
                    eprintln!("Invalid arguments: {args:?}");
                    return ExitCode::FAILURE;
                }
            }
        }
        _ => {
            eprintln!("Usage: gen-ramp [start_mhz stop_mhz count]");
            return ExitCode::FAILURE;
        }
    };

    let generator = RampGenerator::default();
    let mut up = vec![0u16; count];
    let mut down = vec![0u16; count];

    if let Err(e) = generator
        .generate(start, stop, &mut up)
        .and_then(|_| generator.generate(stop, start, &mut down))
    {
        eprintln!("Failed: {e}");
        return ExitCode::FAILURE;
    }

    for (i, (up, down)) in up.iter().zip(down.iter()).enumerate() {
        println!("{i:4} {up:4} {down:4}");
    }

    ExitCode::SUCCESS
}
