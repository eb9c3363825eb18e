//! `sources` command: print the registry without contacting any source.

use affdb_core::{AppConfig, Audience, AuthScheme, PagingStyle, SourceConfig};

pub(crate) fn list_sources(config: &AppConfig) -> anyhow::Result<()> {
    let registry = affdb_core::load_sources(&config.sources_path)?;
    println!(
        "{} source(s) in {}",
        registry.sources.len(),
        config.sources_path.display()
    );
    for source in &registry.sources {
        let credential_set = source
            .resolve_credential(|key| std::env::var(key))
            .is_ok_and(|c| c.is_some());
        println!("{}", describe(source, credential_set));
    }
    Ok(())
}

/// One line per source. `credential_set` is only consulted for sources
/// that authenticate.
pub(crate) fn describe(source: &SourceConfig, credential_set: bool) -> String {
    let state = if source.enabled { "enabled" } else { "disabled" };
    let paging = match source.paging {
        PagingStyle::PageNumber => "page-number",
        PagingStyle::Cursor => "cursor",
    };
    let auth = match (&source.auth, credential_set) {
        (AuthScheme::None, _) => "public".to_string(),
        (_, true) => format!("{} set", source.credential_env.as_deref().unwrap_or_default()),
        (_, false) => format!(
            "{} MISSING",
            source.credential_env.as_deref().unwrap_or_default()
        ),
    };
    let audience = match source.audience {
        Audience::Any => "any",
        Audience::Women => "women",
        Audience::Men => "men",
    };
    format!(
        "  {:<24} {:<8} {:<9} {:<12} audience={audience} auth={auth} {}",
        source.name,
        source.network.as_str(),
        state,
        paging,
        source.base_url
    )
}
