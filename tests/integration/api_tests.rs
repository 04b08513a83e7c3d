use super::*;
use axum::http::{header, Method, StatusCode};
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use tempfile::TempDir;

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(1), dir.path())?;

    let response = make_request(&app, Method::GET, "/health").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "fee-harvester");
    Ok(())
}

#[tokio::test]
async fn test_colleges_are_listed_sorted() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(1), dir.path())?;

    let response = make_request(&app, Method::GET, "/colleges").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?, json!(["Another Institute", "Test College"]));
    Ok(())
}

#[tokio::test]
async fn test_unknown_task_progress_is_sentinel() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(1), dir.path())?;

    let response = make_request(&app, Method::GET, "/progress/does-not-exist").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["status"], "not_found");
    assert_eq!(body["percentage"], 0);
    assert_eq!(body["message"], "Task not found");
    Ok(())
}

#[tokio::test]
async fn test_scrape_unknown_college_is_404() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(3), dir.path())?;

    let response = make_request(&app, Method::GET, "/scrape?college=Nowhere&task_id=t-unknown").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?, json!({ "error": "College not found" }));

    let progress = body_json(make_request(&app, Method::GET, "/progress/t-unknown").await?).await?;
    assert_eq!(progress["status"], "error");
    assert_eq!(progress["percentage"], 0);
    assert_eq!(progress["message"], "College not found");
    Ok(())
}

#[tokio::test]
async fn test_scrape_streams_zip_archive() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(3), dir.path())?;

    let response = make_request(&app, Method::GET, "/scrape?college=Test%20College&task_id=t-ok").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Test_College_fees.zip\""
    );

    let bytes = body_bytes(response).await?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "Test_College_B_Tech_Branch_0_1.csv",
            "Test_College_B_Tech_Branch_1_2.csv",
            "Test_College_B_Tech_Branch_2_3.csv",
        ]
    );

    let mut csv = String::new();
    archive
        .by_name("Test_College_B_Tech_Branch_1_2.csv")?
        .read_to_string(&mut csv)?;
    assert_eq!(csv, "\u{feff}Year,Fee\r\n1st Year,\"₹1,00,000\"\r\n");

    let progress = body_json(make_request(&app, Method::GET, "/progress/t-ok").await?).await?;
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["percentage"], 100);
    assert_eq!(progress["message"], "Download ready!");
    assert_eq!(progress["current"], 3);
    assert_eq!(progress["total"], 3);
    Ok(())
}

#[tokio::test]
async fn test_transmitted_archive_is_cleaned_up() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(2), dir.path())?;

    let response = make_request(&app, Method::GET, "/scrape?college=Test%20College").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);

    let bytes = body_bytes(response).await?;
    assert!(!bytes.is_empty());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_scrape_without_groups_is_404() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(0), dir.path())?;

    let response = make_request(&app, Method::GET, "/scrape?college=Test%20College&task_id=t-empty").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await?;
    let message = body["error"].as_str().unwrap_or_default().to_string();
    assert!(message.starts_with("No courses found on the page"));

    let progress = body_json(make_request(&app, Method::GET, "/progress/t-empty").await?).await?;
    assert_eq!(progress["status"], "error");
    assert_eq!(progress["percentage"], 10);
    assert_eq!(progress["message"], Value::String(message));
    Ok(())
}

#[tokio::test]
async fn test_scrape_without_rows_is_404() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let site = FakeSite {
        html: NO_TABLES,
        ..FakeSite::with_groups(2)
    };
    let app = create_test_app(site, dir.path())?;

    let response = make_request(&app, Method::GET, "/scrape?college=Test%20College&task_id=t-norows").await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await?, json!({ "error": "No data found after scraping" }));

    let progress = body_json(make_request(&app, Method::GET, "/progress/t-norows").await?).await?;
    assert_eq!(progress["status"], "error");
    assert_eq!(progress["message"], "No data found after scraping");
    Ok(())
}

#[tokio::test]
async fn test_browser_failure_is_500_with_message() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let site = FakeSite {
        launchable: false,
        ..FakeSite::with_groups(2)
    };
    let app = create_test_app(site, dir.path())?;

    let response = make_request(&app, Method::GET, "/scrape?college=Test%20College&task_id=t-crash").await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await?;
    let message = body["error"].as_str().unwrap_or_default().to_string();
    assert!(message.starts_with("Unexpected error (Browser):"));

    let progress = body_json(make_request(&app, Method::GET, "/progress/t-crash").await?).await?;
    assert_eq!(progress["status"], "error");
    assert_eq!(progress["message"], Value::String(message));
    Ok(())
}

#[tokio::test]
async fn test_scrape_requires_college() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let app = create_test_app(FakeSite::with_groups(1), dir.path())?;

    let response = make_request(&app, Method::GET, "/scrape").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
