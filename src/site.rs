use crate::config::{Config, PageConfig};
use crate::data::{LookupSource, LookupTable};
use crate::style::YearStyle;
use anyhow::{Context, Result};
use minijinja::{context, path_loader, Environment};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// Values the page template exposes as `window.APP_CONFIG`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub mapbox_token: String,
    pub map_style: String,
    pub county_lookup_url: String,
    /// Prefix for the per-year `<year>.json` style files
    pub styles_url: String,
}

impl AppConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mapbox_token: config.site.mapbox_token.clone(),
            map_style: config.site.map_style.clone(),
            county_lookup_url: config.lookup_url.clone(),
            styles_url: config.site.styles_url.clone(),
        }
    }
}

/// A rendered output file waiting to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFile {
    pub dest: PathBuf,
    pub contents: String,
}

/// Render every configured page in memory. Fails on the first template error.
/// Templates see `app_config`, the ascending `years` and the `active_year`.
pub fn render_pages(config: &Config, years: &[i32]) -> Result<Vec<RenderedFile>> {
    let mut env = Environment::new();
    env.set_loader(path_loader(&config.site.template_dir));

    let app_config = AppConfig::from_config(config);
    config
        .site
        .pages
        .iter()
        .map(|page| render_page(&env, page, &app_config, years))
        .collect()
}

fn render_page(
    env: &Environment,
    page: &PageConfig,
    app_config: &AppConfig,
    years: &[i32],
) -> Result<RenderedFile> {
    let template = env
        .get_template(&page.src)
        .with_context(|| format!("failed to load template {}", page.src))?;
    let contents = template
        .render(context! {
            app_config => app_config,
            years => years,
            active_year => years.last(),
        })
        .with_context(|| format!("failed to render {}", page.src))?;
    Ok(RenderedFile {
        dest: page.dest.clone(),
        contents,
    })
}

/// One style export per year, as `<styles_dir>/<year>.json`.
pub fn render_styles(config: &Config, lookup: &LookupTable) -> Result<Vec<RenderedFile>> {
    lookup
        .years()
        .into_iter()
        .map(|year| {
            let style = YearStyle::build(&config.style, year, lookup.records(year))?;
            let contents = simd_json::to_string(&style.export(&config.style))?;
            Ok(RenderedFile {
                dest: config.site.styles_dir.join(format!("{year}.json")),
                contents,
            })
        })
        .collect()
}

/// Render all pages and year styles, then write them. Nothing is written
/// unless everything renders.
pub fn build(config: &Config) -> Result<Vec<PathBuf>> {
    let source = LookupSource::parse(&config.lookup_url);
    let lookup = LookupTable::load(&source)
        .with_context(|| format!("failed to load county lookup from {source}"))?;

    let mut files = render_pages(config, &lookup.years())?;
    files.extend(render_styles(config, &lookup)?);

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        if let Some(parent) = file.dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&file.dest, file.contents)
            .with_context(|| format!("failed to write {}", file.dest.display()))?;
        tracing::info!(dest = %file.dest.display(), "rendered file");
        written.push(file.dest);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageConfig;
    use std::path::Path;

    fn site_config(root: &Path) -> Config {
        let templates = root.join("pages");
        fs::create_dir_all(&templates).unwrap();
        fs::write(
            templates.join("layout.twig"),
            "<html><body>{% block body %}{% endblock %}</body></html>",
        )
        .unwrap();
        fs::write(
            templates.join("index.twig"),
            r#"{% extends "layout.twig" %}{% block body %}{% for year in years %}<button data-year="{{ year }}">{{ year }}</button>{% endfor %}<script>window.APP_CONFIG = {{ app_config | tojson }};</script>{% endblock %}"#,
        )
        .unwrap();
        fs::write(templates.join("home.twig"), "<h1>Home</h1>").unwrap();

        let lookup = root.join("lookup.json");
        fs::write(&lookup, r#"{"2024": {"6037": 250000, "1001": 900}, "2020": {"6037": 300000}}"#).unwrap();

        let mut config = Config::default();
        config.lookup_url = lookup.display().to_string();
        config.site.template_dir = templates;
        config.site.styles_dir = root.join("dist/styles");
        config.site.pages = vec![
            PageConfig {
                src: "index.twig".to_string(),
                dest: root.join("dist/index.html"),
            },
            PageConfig {
                src: "home.twig".to_string(),
                dest: root.join("dist/home.html"),
            },
        ];
        config
    }

    #[test]
    fn test_build_writes_pages_and_styles() {
        let dir = tempfile::tempdir().unwrap();
        let config = site_config(dir.path());
        let written = build(&config).unwrap();
        assert_eq!(written.len(), 4);

        let index = fs::read_to_string(dir.path().join("dist/index.html")).unwrap();
        assert!(index.starts_with(
            r#"<html><body><button data-year="2020">2020</button><button data-year="2024">2024</button><script>window.APP_CONFIG = "#
        ));
        assert!(index.contains(r#""stylesUrl":"styles""#));
        assert_eq!(
            fs::read_to_string(dir.path().join("dist/home.html")).unwrap(),
            "<h1>Home</h1>"
        );

        let style = fs::read_to_string(dir.path().join("dist/styles/2024.json")).unwrap();
        assert!(style.starts_with(r#"{"year":2024,"layer":{"id":"snap-counties-fill""#));
        assert!(dir.path().join("dist/styles/2020.json").exists());
    }

    #[test]
    fn test_default_index_has_year_buttons() {
        let config = Config::default();
        let pages = render_pages(&config, &[2020, 2021, 2024]).unwrap();
        let index = &pages[0].contents;
        assert!(index.contains(r#"<div id="year-controls">"#));
        assert!(index.contains(r#"<button data-year="2020">2020</button>"#));
        assert!(index.contains(r#"<button data-year="2024" class="active">2024</button>"#));
        assert!(!index.contains("app.js"));
        assert!(index.contains("window.APP_CONFIG = {"));
    }

    #[test]
    fn test_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = site_config(dir.path());
        config.site.pages.push(PageConfig {
            src: "missing.twig".to_string(),
            dest: dir.path().join("dist/missing.html"),
        });
        assert!(build(&config).is_err());
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_missing_lookup_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = site_config(dir.path());
        config.lookup_url = dir.path().join("nope.json").display().to_string();
        assert!(build(&config).is_err());
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_syntax_error_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = site_config(dir.path());
        fs::write(config.site.template_dir.join("home.twig"), "{% if %}").unwrap();
        assert!(render_pages(&config, &[2024]).is_err());
    }
}
