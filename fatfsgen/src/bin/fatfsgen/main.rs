//! Command line front end: builds an image from a host directory or
//! extracts an image into one.

mod logger;

use std::{env, fs, path::PathBuf, process::ExitCode};

use fatfsgen::{fat::FatType, host, ImageConfig, PartitionMode};
use log::error;

const USAGE: &str = "\
usage: fatfsgen <input_dir> [--output_file PATH] [--partition_size N]
                [--sector_size N] [--sectors_per_cluster N] [--root_entry_count N]
                [--fat_count N] [--fat_type 12|16|32] [--long_name_support]
                [--use_default_datetime] [--read_only] [-v]
       fatfsgen --extract IMAGE OUT_DIR [-v]

Numbers are decimal or 0x-prefixed hexadecimal.";

const DEFAULT_OUTPUT: &str = "fatfs_image.img";

#[derive(Debug, PartialEq)]
enum Command {
	Generate {
		input_dir: PathBuf,
		output: PathBuf,
		config: ImageConfig,
	},
	Extract {
		image: PathBuf,
		out_dir: PathBuf,
	},
	Help,
}

#[derive(Debug, PartialEq)]
struct Args {
	command: Command,
	verbosity: u8,
}

fn parse_number(flag: &str, value: &str) -> Result<u64, String> {
	let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Some(hex) => u64::from_str_radix(hex, 16),
		None => value.parse(),
	};
	parsed.map_err(|_| format!("{flag}: {value:?} is not a number"))
}

fn parse_u32(flag: &str, value: &str) -> Result<u32, String> {
	let n = parse_number(flag, value)?;
	u32::try_from(n).map_err(|_| format!("{flag}: {n} is too large"))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
	let mut args = args.into_iter();
	let mut verbosity = 0;
	let mut positional = Vec::new();
	let mut extract = false;
	let mut output = None;
	// defaults of the command line differ from `ImageConfig::default` in
	// that long names are opt-in
	let mut config = ImageConfig::default().long_names(false).use_default_datetime(false);

	while let Some(arg) = args.next() {
		let mut value = |flag: &str| {
			args.next()
				.ok_or_else(|| format!("{flag} needs a value"))
		};
		match arg.as_str() {
			"-h" | "--help" => {
				return Ok(Args {
					command: Command::Help,
					verbosity,
				})
			}
			"-v" | "--verbose" => verbosity += 1,
			"-vv" => verbosity += 2,
			"--extract" => extract = true,
			"--output_file" => output = Some(PathBuf::from(value(&arg)?)),
			"--partition_size" => {
				config = config.partition_size(parse_number(&arg, &value(&arg)?)?);
			}
			"--sector_size" => config = config.sector_size(parse_u32(&arg, &value(&arg)?)?),
			"--sectors_per_cluster" => {
				config = config.sectors_per_cluster(parse_u32(&arg, &value(&arg)?)?);
			}
			"--root_entry_count" => {
				config = config.root_entry_count(parse_u32(&arg, &value(&arg)?)?);
			}
			"--fat_count" => config = config.fat_count(parse_u32(&arg, &value(&arg)?)?),
			"--fat_type" => {
				let fat_type = match value(&arg)?.as_str() {
					"12" => FatType::Fat12,
					"16" => FatType::Fat16,
					"32" => FatType::Fat32,
					other => return Err(format!("--fat_type: expected 12, 16 or 32, got {other:?}")),
				};
				config = config.fat_type(fat_type);
			}
			"--long_name_support" => config = config.long_names(true),
			"--use_default_datetime" => config = config.use_default_datetime(true),
			"--read_only" => config = config.mode(PartitionMode::ReadOnly),
			flag if flag.starts_with('-') && flag.len() > 1 => {
				return Err(format!("unknown option {flag}"));
			}
			path => positional.push(PathBuf::from(path)),
		}
	}

	let command = if extract {
		match <[PathBuf; 2]>::try_from(positional) {
			Ok([image, out_dir]) => Command::Extract { image, out_dir },
			Err(_) => return Err("--extract needs an image and an output directory".into()),
		}
	} else {
		match <[PathBuf; 1]>::try_from(positional) {
			Ok([input_dir]) => Command::Generate {
				input_dir,
				output: output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
				config,
			},
			Err(_) => return Err("expected exactly one input directory".into()),
		}
	};
	Ok(Args { command, verbosity })
}

fn run(command: Command) -> fatfsgen::Result<()> {
	match command {
		Command::Generate {
			input_dir,
			output,
			config,
		} => host::generate(&input_dir, &output, config),
		Command::Extract { image, out_dir } => host::extract(&fs::read(image)?, &out_dir),
		Command::Help => {
			println!("{USAGE}");
			Ok(())
		}
	}
}

fn main() -> ExitCode {
	let args = match parse_args(env::args().skip(1)) {
		Ok(args) => args,
		Err(msg) => {
			eprintln!("{msg}\n\n{USAGE}");
			return ExitCode::from(2);
		}
	};
	if let Err(e) = logger::init(args.verbosity) {
		eprintln!("failed to install logger: {e}");
	}
	match run(args.command) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{e}");
			ExitCode::FAILURE
		}
	}
}
