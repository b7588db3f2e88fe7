//! Commands against a vault on disk.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use fmgen_cli::commands::{file, init, preview, run, Session};

fn vault(settings: &str) -> Result<TempDir> {
    let dir = TempDir::new()?;
    let root = dir.path();
    fs::create_dir_all(root.join("Daily"))?;
    fs::create_dir_all(root.join("Templates"))?;
    fs::write(root.join(".fmgen.toml"), settings)?;
    fs::write(root.join("Daily/2024-05-06.md"), "Went running #health\r\n")?;
    fs::write(root.join("Daily/2024-05-07.md"), "---\ntitle: custom\n---\n\nRest day")?;
    fs::write(root.join("Templates/daily.md"), "template body")?;
    fs::write(root.join("index.md"), "# Index")?;
    Ok(dir)
}

fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap()
}

#[tokio::test]
async fn test_run_updates_vault_and_respects_ignores() -> Result<()> {
    let dir = vault(
        "template = \"{ folder: file.parent.path, tags: file.tags }\"\nfolderToIgnore = \"Templates\"\n",
    )?;
    let root = dir.path();
    let session = Session::open(root, None).await?;

    run::execute(&session, None, false).await?;

    assert_eq!(
        read(root, "Daily/2024-05-06.md"),
        "---\nfolder: Daily\ntags:\n- health\n---\n\nWent running #health"
    );
    assert_eq!(
        read(root, "Daily/2024-05-07.md"),
        "---\nfolder: Daily\ntags: []\ntitle: custom\n---\n\nRest day"
    );
    assert_eq!(read(root, "Templates/daily.md"), "template body");
    let index = read(root, "index.md");
    assert!(index.starts_with("---\nfolder: "), "{index}");
    assert!(index.ends_with("tags: []\n---\n\n# Index"), "{index}");
    Ok(())
}

#[tokio::test]
async fn test_run_folder_dry_run_writes_nothing() -> Result<()> {
    let dir = vault("template = \"{ a: 1 }\"\n")?;
    let root = dir.path();
    let session = Session::open(root, None).await?;

    run::execute(&session, Some("Daily"), true).await?;

    assert_eq!(read(root, "Daily/2024-05-06.md"), "Went running #health\r\n");
    assert_eq!(read(root, "index.md"), "# Index");
    Ok(())
}

#[tokio::test]
async fn test_run_reports_template_failures() -> Result<()> {
    let dir = vault("template = \"{ a: nope.b }\"\n")?;
    let session = Session::open(dir.path(), None).await?;

    let err = run::execute(&session, None, false).await.unwrap_err();

    assert!(err.to_string().contains("documents failed"));
    assert_eq!(read(dir.path(), "index.md"), "# Index");
    Ok(())
}

#[tokio::test]
async fn test_file_command_updates_one_document() -> Result<()> {
    let dir = vault("template = \"{ title: file.basename }\"\n")?;
    let root = dir.path();
    let session = Session::open(root, None).await?;

    file::execute(&session, &root.join("index.md"), true).await?;
    assert_eq!(read(root, "index.md"), "# Index");

    file::execute(&session, &root.join("index.md"), false).await?;
    assert_eq!(read(root, "index.md"), "---\ntitle: index\n---\n\n# Index");
    assert_eq!(read(root, "Daily/2024-05-06.md"), "Went running #health\r\n");
    Ok(())
}

#[tokio::test]
async fn test_file_outside_vault_is_rejected() -> Result<()> {
    let dir = vault("template = \"{ a: 1 }\"\n")?;
    let other = TempDir::new()?;
    fs::write(other.path().join("x.md"), "x")?;
    let session = Session::open(dir.path(), None).await?;

    assert!(file::execute(&session, &other.path().join("x.md"), false).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_query_api_sees_other_pages() -> Result<()> {
    let dir = vault("template = \"{ siblings: dv.pages('\\\"Daily\\\"').length }\"\n")?;
    let root = dir.path();
    let session = Session::open(root, None).await?;

    file::execute(&session, &root.join("index.md"), false).await?;

    assert_eq!(read(root, "index.md"), "---\nsiblings: 2\n---\n\n# Index");
    Ok(())
}

#[tokio::test]
async fn test_preview_uses_sample_and_validates_template() -> Result<()> {
    let dir = vault("template = \"{}\"\n")?;
    let session = Session::open(dir.path(), None).await?;

    preview::execute(&session, None, Some("{ folder: file.parent.path }")).await?;
    assert!(preview::execute(&session, None, Some("{ a: ")).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_init_does_not_overwrite() -> Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path();

    init::execute(root, None, false).await?;
    let created = read(root, ".fmgen.toml");
    assert!(created.contains("template = \"{}\""));

    fs::write(root.join(".fmgen.toml"), "template = \"{ a: 1 }\"\n")?;
    init::execute(root, None, false).await?;
    assert_eq!(read(root, ".fmgen.toml"), "template = \"{ a: 1 }\"\n");

    init::execute(root, None, true).await?;
    assert_eq!(read(root, ".fmgen.toml"), created);
    Ok(())
}

#[tokio::test]
async fn test_json_settings_file() -> Result<()> {
    let dir = vault("")?;
    let root = dir.path();
    let config = root.join("fmgen.json");
    fs::write(&config, r#"{ "template": "{ b: 1, a: 2 }", "sortKeysOnWrite": false }"#)?;
    let session = Session::open(root, Some(&config)).await?;

    file::execute(&session, &root.join("index.md"), false).await?;

    assert_eq!(read(root, "index.md"), "---\nb: 1\na: 2\n---\n\n# Index");
    Ok(())
}
