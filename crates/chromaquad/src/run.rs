use anyhow::{Context, Result};
use quadconfig::{MissingUniformSetting, QuadConfig, VariantSetting};
use renderer::{
    ColorRates, MissingUniformPolicy, ProgramBindings, RenderVariant, Renderer, RendererConfig,
    ShaderOrigin, UniformLocation, FILL_COLOR_UNIFORM, MODEL_VIEW_UNIFORM, PROJECTION_UNIFORM,
    VERTEX_POSITION_ATTRIBUTE,
};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::paths::AppPaths;

pub fn run(cli: Cli) -> Result<()> {
    let file_config = load_file_config(&cli)?;
    let config = renderer_config(&cli, file_config);
    tracing::debug!(?config, "resolved renderer configuration");

    if cli.check {
        return check(&config);
    }

    tracing::info!(
        width = config.surface_size.0,
        height = config.surface_size.1,
        variant = ?config.variant,
        "starting chromaquad"
    );
    Renderer::new(config).run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// `--config` (or `CHROMAQUAD_CONFIG`) wins; otherwise the per-user file is
/// used when it exists, and built-in defaults when it does not.
fn load_file_config(cli: &Cli) -> Result<QuadConfig> {
    if let Some(path) = cli.config.as_deref() {
        tracing::debug!(path = %path.display(), "loading configuration");
        return QuadConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    let discovered = match AppPaths::discover() {
        Ok(paths) => paths.existing_config_file(),
        Err(err) => {
            tracing::debug!(error = %err, "skipping user configuration lookup");
            None
        }
    };
    match discovered {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading user configuration");
            QuadConfig::load(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => Ok(QuadConfig::default()),
    }
}

/// Applies command-line overrides on top of the file configuration.
fn renderer_config(cli: &Cli, file: QuadConfig) -> RendererConfig {
    let QuadConfig {
        window,
        render,
        shaders,
        ..
    } = file;

    let variant = match cli.variant.unwrap_or(render.variant) {
        VariantSetting::Full => RenderVariant::Full,
        VariantSetting::Clear => RenderVariant::ClearOnly,
    };
    let missing_uniform = match cli.missing_uniform.unwrap_or(render.missing_uniform) {
        MissingUniformSetting::Skip => MissingUniformPolicy::Skip,
        MissingUniformSetting::Fail => MissingUniformPolicy::Fail,
    };
    let origin = |path: Option<std::path::PathBuf>| path.map_or(ShaderOrigin::Builtin, ShaderOrigin::File);

    RendererConfig {
        surface_size: cli.size.unwrap_or((window.width, window.height)),
        title: window.title,
        variant,
        frame_quantum: cli.quantum.unwrap_or(render.frame_quantum),
        rates: ColorRates {
            red: render.rates.red,
            green: render.rates.green,
            blue: render.rates.blue,
        },
        missing_uniform,
        vsync: render.vsync && !cli.no_vsync,
        vertex_shader: origin(cli.vertex_shader.clone().or(shaders.vertex)),
        fragment_shader: origin(cli.fragment_shader.clone().or(shaders.fragment)),
    }
}

fn check(config: &RendererConfig) -> Result<()> {
    let bindings = renderer::check(config).context("shader check failed")?;
    print!("{}", describe_bindings(&bindings));
    Ok(())
}

fn describe_bindings(bindings: &ProgramBindings) -> String {
    let uniform = |location: &UniformLocation| {
        format!(
            "group {} binding {} offset {} ({:?})",
            location.group, location.binding, location.offset, location.kind
        )
    };
    let mut out = String::from("shader program linked\n");
    out.push_str(&format!(
        "  {VERTEX_POSITION_ATTRIBUTE:<16} location {}\n",
        bindings.vertex_position.location
    ));
    out.push_str(&format!(
        "  {MODEL_VIEW_UNIFORM:<16} {}\n",
        uniform(&bindings.model_view)
    ));
    out.push_str(&format!(
        "  {PROJECTION_UNIFORM:<16} {}\n",
        uniform(&bindings.projection)
    ));
    match &bindings.fill_color {
        Some(location) => out.push_str(&format!("  {FILL_COLOR_UNIFORM:<16} {}\n", uniform(location))),
        None => out.push_str(&format!("  {FILL_COLOR_UNIFORM:<16} unresolved (upload skipped)\n")),
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["chromaquad"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_map_onto_renderer_config() {
        let config = renderer_config(&cli(&[]), QuadConfig::default());
        assert_eq!(config.surface_size, (1280, 720));
        assert_eq!(config.variant, RenderVariant::Full);
        assert_eq!(config.frame_quantum, 0.16);
        assert_eq!(config.rates, ColorRates::default());
        assert_eq!(config.missing_uniform, MissingUniformPolicy::Skip);
        assert!(config.vsync);
        assert_eq!(config.vertex_shader, ShaderOrigin::Builtin);
        assert_eq!(config.fragment_shader, ShaderOrigin::Builtin);
    }

    #[test]
    fn flags_override_file_values() {
        let file = QuadConfig::from_toml_str(
            r#"
                [window]
                width = 300
                height = 200

                [render]
                variant = "full"
                frame_quantum = 0.5

                [shaders]
                fragment = "/from/file.glsl"
            "#,
        )
        .unwrap();
        let config = renderer_config(
            &cli(&[
                "--size",
                "640x480",
                "--variant",
                "clear",
                "--no-vsync",
                "--fragment-shader",
                "/from/flag.glsl",
            ]),
            file,
        );
        assert_eq!(config.surface_size, (640, 480));
        assert_eq!(config.variant, RenderVariant::ClearOnly);
        assert_eq!(config.frame_quantum, 0.5);
        assert!(!config.vsync);
        assert_eq!(
            config.fragment_shader,
            ShaderOrigin::File(PathBuf::from("/from/flag.glsl"))
        );
    }

    #[test]
    fn builtin_bindings_are_described() {
        let bindings = renderer::check(&RendererConfig::default()).unwrap();
        let text = describe_bindings(&bindings);
        assert!(text.contains("aVertexPosition"));
        assert!(text.contains("uProjMat"));
        assert!(!text.contains("unresolved"));
    }
}
