use anyhow::Result;
use fedmsg_notify::{config::Config, processors::ProcessorCatalog};
use serde_json::json;

use crate::common::{BODHI_PREFIX, catalog, message};

/// Test: The catalog picks the processor owning the topic prefix
#[test]
fn test_catalog_selects_by_prefix() -> Result<()> {
    let catalog = catalog();

    let bodhi = message(&format!("{}update.comment", BODHI_PREFIX), json!({}));
    let unknown = message("org.example.thing.happened", json!({}));

    assert_eq!(catalog.for_message(&bodhi).name, "bodhi");
    assert_eq!(catalog.for_message(&unknown).name, "generic");
    assert!(catalog.get("fas").is_some());
    assert!(catalog.get("wiki").is_none());

    Ok(())
}

/// Test: Text falls back to the topic and carries the link
#[test]
fn test_format_text_appends_link() -> Result<()> {
    let catalog = catalog();
    let comment = message(
        &format!("{}update.comment", BODHI_PREFIX),
        json!({"subtitle": "ralph commented", "link": "https://bodhi/1"}),
    );

    let (title, subtitle) = catalog.for_message(&comment).format_text(&comment);

    assert_eq!(title, "update.comment");
    assert_eq!(subtitle, "ralph commented https://bodhi/1");

    Ok(())
}

/// Test: Explicit title and summary are preferred
#[test]
fn test_format_text_uses_body_fields() -> Result<()> {
    let catalog = catalog();
    let update = message(
        "org.example.thing",
        json!({"title": "Thing happened", "msg": {"summary": "details"}}),
    );

    let (title, subtitle) = catalog.for_message(&update).format_text(&update);

    assert_eq!(title, "Thing happened");
    assert_eq!(subtitle, "details");

    Ok(())
}

/// Test: Usernames are collected from every known field
#[test]
fn test_usernames_are_collected() -> Result<()> {
    let catalog = catalog();
    let update = message(
        &format!("{}update.comment", BODHI_PREFIX),
        json!({
            "usernames": ["toshio", "ralph"],
            "username": "lmacken",
            "msg": {"agent": "ralph"},
            "packages": ["nethack"]
        }),
    );
    let processor = catalog.for_message(&update);

    let names: Vec<_> = processor.usernames(&update).into_iter().collect();
    assert_eq!(names, vec!["lmacken", "ralph", "toshio"]);

    let packages: Vec<_> = processor.packages(&update).into_iter().collect();
    assert_eq!(packages, vec!["nethack"]);

    Ok(())
}

/// Test: Malformed processor entries are skipped
#[test]
fn test_processor_prefixes_skip_malformed_entries() -> Result<()> {
    let config = Config {
        processors: vec![
            "bodhi=org.fedoraproject.prod.bodhi.".to_string(),
            "no-prefix".to_string(),
            "=org.example.".to_string(),
            " fas = org.fedoraproject.prod.fas. ".to_string(),
        ],
        ..Config::default()
    };

    let catalog = ProcessorCatalog::from_prefixes(config.processor_prefixes());
    let names: Vec<_> = catalog.iter().map(|processor| processor.name.as_str()).collect();

    assert_eq!(names, vec!["bodhi", "fas"]);

    Ok(())
}
