//! Template engine based on MiniJinja

use minijinja::Environment;
use rudder_core::{Capabilities, LoadedPack, ReleaseIdentity, TemplateContext, Values};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions;

/// Result of rendering a pack
#[derive(Debug)]
pub struct RenderResult {
    /// Rendered manifests by template path (relative to `templates/`), in file order
    pub manifests: BTreeMap<String, String>,
}

impl RenderResult {
    /// Join every manifest into one multi-document text, each document headed by
    /// a separator and a `# Source:` comment naming its template
    pub fn to_manifest(&self, pack_name: &str) -> String {
        let mut out = String::new();
        for (name, content) in &self.manifests {
            out.push_str("---\n");
            out.push_str(&format!("# Source: {}/templates/{}\n", pack_name, name));
            out.push_str(content.trim_end());
            out.push('\n');
        }
        out
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    strict_mode: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    /// Create a configured MiniJinja environment
    fn create_environment(&self, strict: bool) -> Environment<'static> {
        let mut env = Environment::new();
        // Manifests are YAML; never HTML/JSON-escape interpolated values
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);

        if strict {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        }

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("indent", filters::indent);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("required", filters::required);
        env.add_filter("sha256", filters::sha256sum);
        env.add_filter("trunc", filters::trunc);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("ternary", functions::ternary);

        env
    }

    /// Render all templates in a pack
    ///
    /// Helper templates (file names starting with `_`) are loaded for includes and
    /// macros but not rendered on their own. Notes and empty outputs are dropped.
    pub fn render_pack(&self, pack: &LoadedPack, context: &TemplateContext) -> Result<RenderResult> {
        let template_files = pack.template_files()?;
        let strict = self.strict_mode && pack.pack.engine.strict;
        let mut env = self.create_environment(strict);
        let mut sources = BTreeMap::new();

        for file_path in &template_files {
            let rel_path = file_path.strip_prefix(&pack.templates_dir).unwrap_or(file_path);
            let template_name = rel_path.to_string_lossy().replace('\\', "/");
            let content = std::fs::read_to_string(file_path)?;

            env.add_template_owned(template_name.clone(), content.clone())
                .map_err(|e| TemplateError::from_minijinja(e, &template_name, &content))?;
            sources.insert(template_name, content);
        }

        let ctx = Self::context_value(context);
        let mut manifests = BTreeMap::new();

        for (template_name, content) in &sources {
            let file_name = template_name.rsplit('/').next().unwrap_or(template_name);
            if file_name.starts_with('_') || file_name.to_lowercase().starts_with("notes") {
                continue;
            }

            let tmpl = env
                .get_template(template_name)
                .map_err(|e| TemplateError::from_minijinja(e, template_name, content))?;
            let rendered = tmpl
                .render(&ctx)
                .map_err(|e| TemplateError::from_minijinja(e, template_name, content))?;

            let trimmed = rendered.trim();
            if trimmed.is_empty() || trimmed == "---" {
                continue;
            }

            let output_name = template_name
                .trim_end_matches(".j2")
                .trim_end_matches(".jinja2")
                .to_string();
            manifests.insert(output_name, rendered);
        }

        Ok(RenderResult { manifests })
    }

    /// Render a pack for a release: the pack's own defaults are merged under
    /// `values`, and the result is joined into a single manifest text.
    pub fn render_release(
        &self,
        pack: &LoadedPack,
        values: &Values,
        capabilities: &Capabilities,
        release: &ReleaseIdentity,
    ) -> Result<String> {
        let effective = pack.default_values().map_err(EngineError::from)?.merged_with(values);
        let context = TemplateContext::new(effective, release.to_info(), &pack.pack.metadata)
            .with_capabilities(capabilities.clone());

        let result = self.render_pack(pack, &context)?;
        Ok(result.to_manifest(pack.name()))
    }

    fn context_value(context: &TemplateContext) -> minijinja::Value {
        minijinja::context! {
            values => &context.values,
            release => &context.release,
            pack => &context.pack,
            capabilities => &context.capabilities,
        }
    }
}
