//! Template command - render config trees into manifests

use console::style;
use miette::{Report, Result, WrapErr};
use rudder_compose::{ComposeError, Pipeline, discover_configs};
use rudder_engine::{Engine, EngineError};
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn run(configs: &[PathBuf], output_dir: &Path) -> Result<()> {
    let mut pipeline = Pipeline::new(Engine::default(), output_dir);

    for input in configs {
        let files = discover_configs(input).map_err(Report::new)?;
        debug!("{}: {} config files", input.display(), files.len());

        for config in files {
            let written = pipeline
                .process(&config)
                .map_err(into_report)
                .wrap_err_with(|| format!("Failed to process {}", config.display()))?;

            for path in written {
                println!("{} {}", style("wrote").green(), path.display());
            }
        }
    }

    Ok(())
}

/// Template failures keep their source-annotated diagnostic
fn into_report(err: ComposeError) -> Report {
    match err {
        ComposeError::Render { chart, source } => match source.downcast::<EngineError>() {
            Ok(engine_err) => match *engine_err {
                EngineError::Template(template_err) => {
                    Report::new(template_err).wrap_err(format!("Failed to render chart {}", chart))
                }
                other => Report::new(ComposeError::Render {
                    chart,
                    source: Box::new(other),
                }),
            },
            Err(source) => Report::new(ComposeError::Render { chart, source }),
        },
        ComposeError::InDocument { path, source } => {
            into_report(*source).wrap_err(format!("Error in {}", path.display()))
        }
        other => Report::new(other),
    }
}
