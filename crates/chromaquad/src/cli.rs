use std::path::PathBuf;

use clap::Parser;
use quadconfig::{parse_missing_uniform, parse_variant, MissingUniformSetting, VariantSetting};

#[derive(Parser, Debug)]
#[command(
    name = "chromaquad",
    author,
    version,
    about = "Compiles a shader pair and animates a color-cycling quad",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Configuration file; can also be supplied via the `CHROMAQUAD_CONFIG` env var.
    #[arg(long, value_name = "FILE", env = "CHROMAQUAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Frame content: `full` (quad over animated clear) or `clear` (clear only).
    #[arg(long, value_name = "VARIANT", value_parser = parse_variant)]
    pub variant: Option<VariantSetting>,

    /// Fixed time step added per frame to the color oscillation.
    #[arg(long, value_name = "STEP", value_parser = parse_quantum)]
    pub quantum: Option<f64>,

    /// What to do when the fragment shader lacks `uColor`: `skip` or `fail`.
    #[arg(long, value_name = "POLICY", value_parser = parse_missing_uniform)]
    pub missing_uniform: Option<MissingUniformSetting>,

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,

    /// GLSL file replacing the built-in vertex shader.
    #[arg(long, value_name = "FILE")]
    pub vertex_shader: Option<PathBuf>,

    /// GLSL file replacing the built-in fragment shader.
    #[arg(long, value_name = "FILE")]
    pub fragment_shader: Option<PathBuf>,

    /// Compile and link the shader pair, print the resolved bindings, and exit.
    #[arg(long)]
    pub check: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

fn parse_quantum(value: &str) -> Result<f64, String> {
    let quantum: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame quantum '{value}'"))?;
    if !quantum.is_finite() || quantum <= 0.0 {
        return Err("frame quantum must be a positive number".into());
    }
    Ok(quantum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_surface_size(" 800 X 600 ").unwrap(), (800, 600));
        assert!(parse_surface_size("1280").is_err());
        assert!(parse_surface_size("0x720").is_err());
        assert!(parse_surface_size("widexhigh").is_err());
    }

    #[test]
    fn rejects_non_positive_quantum() {
        assert_eq!(parse_quantum("0.16").unwrap(), 0.16);
        assert!(parse_quantum("0").is_err());
        assert!(parse_quantum("-1").is_err());
        assert!(parse_quantum("NaN").is_err());
    }

    #[test]
    fn flags_parse_into_overrides() {
        let cli = Cli::try_parse_from([
            "chromaquad",
            "--size",
            "640x480",
            "--variant",
            "clear",
            "--missing-uniform",
            "fail",
            "--no-vsync",
            "--check",
        ])
        .unwrap();
        assert_eq!(cli.size, Some((640, 480)));
        assert_eq!(cli.variant, Some(VariantSetting::Clear));
        assert_eq!(cli.missing_uniform, Some(MissingUniformSetting::Fail));
        assert!(cli.no_vsync);
        assert!(cli.check);
        assert!(cli.quantum.is_none());
    }
}
