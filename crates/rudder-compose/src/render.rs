//! Rendering the charts of a target

use rudder_core::{Capabilities, LoadedPack, ReleaseIdentity, Values};
use rudder_engine::Engine;
use tracing::{debug, info};

use crate::document::{Chart, Document};
use crate::error::{BoxError, ComposeError, Result};
use crate::state::ResolutionContext;
use crate::target::RenderedRelease;

/// Turns a pack and its effective values into manifest text
pub trait ChartRenderer {
    fn render(
        &self,
        pack: &LoadedPack,
        values: &Values,
        capabilities: &Capabilities,
        release: &ReleaseIdentity,
    ) -> std::result::Result<String, BoxError>;
}

impl ChartRenderer for Engine {
    fn render(
        &self,
        pack: &LoadedPack,
        values: &Values,
        capabilities: &Capabilities,
        release: &ReleaseIdentity,
    ) -> std::result::Result<String, BoxError> {
        self.render_release(pack, values, capabilities, release)
            .map_err(BoxError::from)
    }
}

/// Render one chart with the global values overlaid by its own, then apply its patches
pub fn render_chart<R: ChartRenderer + ?Sized>(
    renderer: &R,
    chart: &Chart,
    state: &ResolutionContext,
) -> Result<RenderedRelease> {
    let values = state.effective_values(&chart.values);

    let mut manifest = renderer
        .render(&chart.pack, &values, &state.capabilities, &state.release)
        .map_err(|source| ComposeError::Render {
            chart: chart.path.display().to_string(),
            source,
        })?;

    for patch in &chart.patches {
        manifest = patch.apply(&manifest, values.inner(), chart.name())?;
    }

    debug!(
        "Rendered chart {} ({} patches)",
        chart.name(),
        chart.patches.len()
    );

    Ok(RenderedRelease {
        chart: chart.name().to_string(),
        path: chart.path.clone(),
        manifest,
    })
}

/// Render every chart reachable from `document` onto its target.
///
/// A document without a target renders nothing.
pub fn render_target<R: ChartRenderer + ?Sized>(
    renderer: &R,
    document: &mut Document,
    state: &ResolutionContext,
) -> Result<()> {
    let Some(target) = &document.target else {
        debug!("{} has no target, nothing to render", document.path.display());
        return Ok(());
    };
    info!(
        "Rendering {} into target {}",
        document.path.display(),
        target.path.display()
    );

    let releases = document
        .collect_charts()
        .into_iter()
        .map(|chart| render_chart(renderer, chart, state))
        .collect::<Result<Vec<_>>>()?;

    if let Some(target) = document.target.as_mut() {
        target.releases.extend(releases);
    }
    Ok(())
}
