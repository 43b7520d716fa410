use clap::{command, Arg, ArgAction, ArgMatches};
use std::{path::PathBuf, time::Duration};

use crate::validators::*;
use world_imagery_downloader::{BoundingBox, Config, UrlFormat};

const ZOOM_ARG: &str = "zoom";
const MIN_LAT_ARG: &str = "min_lat";
const MAX_LAT_ARG: &str = "max_lat";
const MIN_LON_ARG: &str = "min_lon";
const MAX_LON_ARG: &str = "max_lon";
const OUTPUT_DIR_ARG: &str = "output_dir";
const WORKERS_ARG: &str = "num_workers";
const RETRIES_ARG: &str = "num_attempts";
const BACKOFF_ARG: &str = "backoff";
const TIMEOUT_ARG: &str = "timeout";
const DRY_RUN_ARG: &str = "dry_run";

pub struct Args {
    pub bounding_box: BoundingBox,
    pub max_zoom: u8,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub attempts: u8,
    pub backoff: Duration,
    pub timeout: Duration,
    pub dry_run: bool,
}

impl std::convert::From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            bounding_box: args.bounding_box,
            max_zoom: args.max_zoom,
            output_folder: args.output_dir,
            workers: args.workers,
            request_attempts: args.attempts,
            backoff: args.backoff,
            timeout: args.timeout,
            url: UrlFormat::default(),
        }
    }
}

impl Args {
    pub fn parse() -> Self {
        Self::from_matches(&get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        // every argument but the flag carries a default, the fallbacks only
        // keep this total
        let defaults = Config::default();
        let bbox = defaults.bounding_box;

        let bounding_box = BoundingBox::new(
            matches.get_one(MIN_LAT_ARG).copied().unwrap_or(bbox.min_lat),
            matches.get_one(MAX_LAT_ARG).copied().unwrap_or(bbox.max_lat),
            matches.get_one(MIN_LON_ARG).copied().unwrap_or(bbox.min_lon),
            matches.get_one(MAX_LON_ARG).copied().unwrap_or(bbox.max_lon),
        );

        let secs = |id: &str, fallback: Duration| {
            matches
                .get_one::<u64>(id)
                .map(|s| Duration::from_secs(*s))
                .unwrap_or(fallback)
        };

        Self {
            bounding_box,
            max_zoom: matches
                .get_one(ZOOM_ARG)
                .copied()
                .unwrap_or(defaults.max_zoom),
            output_dir: matches
                .get_one::<PathBuf>(OUTPUT_DIR_ARG)
                .cloned()
                .unwrap_or(defaults.output_folder),
            workers: matches
                .get_one(WORKERS_ARG)
                .copied()
                .unwrap_or(defaults.workers),
            attempts: matches
                .get_one(RETRIES_ARG)
                .copied()
                .unwrap_or(defaults.request_attempts),
            backoff: secs(BACKOFF_ARG, defaults.backoff),
            timeout: secs(TIMEOUT_ARG, defaults.timeout),
            dry_run: matches.get_flag(DRY_RUN_ARG),
        }
    }
}

fn cli() -> clap::Command {
    command!()
        .arg(
            Arg::new(ZOOM_ARG)
                .help("Highest zoom level to fetch (e.g. 5 fetches zoom levels 0 to 5)")
                .value_parser(is_zoom)
                .default_value("5")
                .short('z')
                .long("zoom"),
        )
        .arg(
            Arg::new(MIN_LAT_ARG)
                .help("Latitude of the southern bounding box boundary (in degrees)")
                .value_parser(is_latitude)
                .default_value("16.5")
                .allow_negative_numbers(true)
                .long("minlat"),
        )
        .arg(
            Arg::new(MAX_LAT_ARG)
                .help("Latitude of the northern bounding box boundary (in degrees)")
                .value_parser(is_latitude)
                .default_value("26.5")
                .allow_negative_numbers(true)
                .long("maxlat"),
        )
        .arg(
            Arg::new(MIN_LON_ARG)
                .help("Longitude of the western bounding box boundary (in degrees)")
                .value_parser(is_longitude)
                .default_value("51.8")
                .allow_negative_numbers(true)
                .long("minlon"),
        )
        .arg(
            Arg::new(MAX_LON_ARG)
                .help("Longitude of the eastern bounding box boundary (in degrees)")
                .value_parser(is_longitude)
                .default_value("60.0")
                .allow_negative_numbers(true)
                .long("maxlon"),
        )
        .arg(
            Arg::new(OUTPUT_DIR_ARG)
                .help("The folder to output the tiles to. Tiles are laid out as `{z}/{x}/{y}.png` below it.")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("./tiles")
                .short('o')
                .long("output"),
        )
        .arg(
            Arg::new(WORKERS_ARG)
                .help("The amount of tiles fetched in parallel.")
                .value_parser(is_numeric_min(1usize))
                .default_value("64")
                .short('w')
                .long("workers"),
        )
        .arg(
            Arg::new(RETRIES_ARG)
                .help("The amount of times a tile is requested before giving up on it.")
                .value_parser(is_numeric_min(1u8))
                .default_value("3")
                .long("retries"),
        )
        .arg(
            Arg::new(BACKOFF_ARG)
                .help("The delay (in seconds) between two attempts at the same tile.")
                .value_parser(is_numeric_min(0u64))
                .default_value("2")
                .long("backoff"),
        )
        .arg(
            Arg::new(TIMEOUT_ARG)
                .help("The timeout (in seconds) for fetching a single tile. Pass 0 for no timeout.")
                .value_parser(is_numeric_min(0u64))
                .default_value("30")
                .short('t')
                .long("timeout"),
        )
        .arg(
            Arg::new(DRY_RUN_ARG)
                .help("Don't actually fetch anything, just determine how many tiles would be fetched.")
                .action(ArgAction::SetTrue)
                .long("dry-run"),
        )
}

fn get_matches() -> ArgMatches {
    cli().get_matches()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let matches = cli()
            .try_get_matches_from(std::iter::once("world-imagery-downloader").chain(args.iter().copied()))
            .unwrap();
        Args::from_matches(&matches)
    }

    #[test]
    fn verify_cli() {
        cli().debug_assert();
    }

    #[test]
    fn defaults_match_config() {
        let config = Config::from(parse(&[]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn negative_coordinates() {
        let args = parse(&[
            "--minlat", "-10.5", "--maxlat", "-1", "--minlon", "-75", "--maxlon", "-70", "-z", "3",
        ]);
        assert_eq!(args.bounding_box, BoundingBox::new(-10.5, -1.0, -75.0, -70.0));
        assert_eq!(args.max_zoom, 3);
        assert!(!args.dry_run);
    }

    #[test]
    fn pool_settings() {
        let args = parse(&["-w", "8", "--retries", "5", "--backoff", "0", "-t", "0", "--dry-run"]);
        assert_eq!(args.workers, 8);
        assert_eq!(args.attempts, 5);
        assert_eq!(args.backoff, Duration::ZERO);
        assert_eq!(args.timeout, Duration::ZERO);
        assert!(args.dry_run);
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in [
            &["--zoom", "30"][..],
            &["--maxlat", "90"],
            &["--minlon", "-181"],
            &["--workers", "0"],
            &["--retries", "0"],
        ] {
            let res = cli().try_get_matches_from(
                std::iter::once("world-imagery-downloader").chain(bad.iter().copied()),
            );
            assert!(res.is_err(), "{:?} was accepted", bad);
        }
    }
}
