use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "keystone", version, about = "Drive the corner detection bridge on local files")]
pub struct Cli {
    /// JSON module config; defaults match the shipped model.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Turn a photo into the network's input tensor.
    Preprocess {
        image: PathBuf,
        /// Write the raw float32 tensor here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Extract corner points from a raw float32 heatmap file.
    Heatmap {
        file: PathBuf,
        #[arg(long)]
        width: i64,
        #[arg(long)]
        height: i64,
    },
    /// Rectify the region bounded by four corners (TL, TR, BR, BL).
    Transform {
        image: PathBuf,
        #[arg(long = "corner", value_parser = parse_corner, required = true)]
        corners: Vec<Corner>,
        /// Write the PNG here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner(pub [f64; 2]);

fn parse_corner(s: &str) -> Result<Corner, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("{v:?}: {e}"))
    };
    Ok(Corner([parse(x)?, parse(y)?]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_corner_pairs() {
        assert_eq!(parse_corner("12.5, 7").unwrap(), Corner([12.5, 7.0]));
        assert!(parse_corner("12.5").is_err());
        assert!(parse_corner("a,b").is_err());
    }

    #[test]
    fn transform_collects_repeated_corners() {
        let cli = Cli::try_parse_from([
            "keystone",
            "transform",
            "photo.png",
            "--corner",
            "0,0",
            "--corner",
            "10,0",
            "--corner",
            "10,5",
            "--corner",
            "0,5",
        ])
        .unwrap();
        match cli.command {
            Command::Transform { corners, out, .. } => {
                assert_eq!(corners.len(), 4);
                assert_eq!(corners[2], Corner([10.0, 5.0]));
                assert!(out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::try_parse_from([
            "keystone",
            "heatmap",
            "hm.bin",
            "--width",
            "640",
            "--height",
            "480",
            "--config",
            "model.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("model.json")));
    }
}
