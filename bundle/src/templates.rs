use std::fs;
use std::io;
use std::path::Path;

/// Token in each page template replaced with the client-side API key.
pub const PLACEHOLDER: &str = "$$SPLIT_CLIENT_API_KEY$$";
const TEMPLATE_SUFFIX: &str = ".html.template";

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedPage {
    pub flag: String,
    pub file_name: String,
    pub content: String,
}

/// Substitutes the first placeholder with `client_key`. Without a key the template
/// is returned unchanged.
pub fn render(template: &str, client_key: Option<&str>) -> String {
    match client_key {
        Some(key) => template.replacen(PLACEHOLDER, key, 1),
        None => template.to_string(),
    }
}

/// Renders `<flag>.html.template` from `dir` into `<flag>.html` for every flag that has one.
pub fn render_templates(dir: &Path, flags: &[&str], client_key: Option<&str>) -> Vec<RenderedPage> {
    if client_key.is_none() {
        tracing::warn!("no client-side API key, pages keep the placeholder");
    }

    let mut pages = Vec::new();
    for flag in flags {
        let template_path = dir.join(format!("{flag}{TEMPLATE_SUFFIX}"));
        let template = match fs::read_to_string(&template_path) {
            Ok(template) => template,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(template = %template_path.display(), "template missing, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    template = %template_path.display(),
                    error = %e,
                    "could not read template"
                );
                continue;
            }
        };

        let page = RenderedPage {
            flag: flag.to_string(),
            file_name: format!("{flag}.html"),
            content: render(&template, client_key),
        };

        let out = dir.join(&page.file_name);
        if let Err(e) = fs::write(&out, &page.content) {
            tracing::warn!(page = %out.display(), error = %e, "could not write page");
            continue;
        }

        tracing::info!(page = %out.display(), "generated page");
        pages.push(page);
    }

    pages
}
