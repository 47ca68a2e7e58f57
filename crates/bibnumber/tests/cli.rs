#![cfg(feature = "cli")]

use std::path::Path;

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use serde_json::Value;

/// White frame with four dark 10x30 bars spaced 20 px apart.
fn write_bars(path: &Path) {
    let mut img = RgbImage::from_pixel(120, 70, Rgb([255, 255, 255]));
    for x0 in [20, 40, 60, 80] {
        for y in 20..50 {
            for x in x0..x0 + 10 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }
    img.save(path).expect("write test image");
}

fn bibnumber() -> Command {
    Command::cargo_bin("bibnumber").expect("binary built")
}

#[test]
fn detect_writes_a_report_for_every_image() {
    let dir = tempfile::tempdir().unwrap();
    write_bars(&dir.path().join("b.png"));
    write_bars(&dir.path().join("a.png"));
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    let config = dir.path().join("params.json");
    std::fs::write(&config, r#"{ "max_stroke_length": 20.0 }"#).unwrap();
    let out = dir.path().join("report.json");

    bibnumber()
        .args(["detect", "--input"])
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["params"]["max_stroke_length"], 20.0);
    assert_eq!(report["params"]["min_chain_len"], 3);

    let images = report["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert!(images[0]["path"].as_str().unwrap().ends_with("a.png"));
    assert!(images[1]["path"].as_str().unwrap().ends_with("b.png"));
    for image in images {
        assert!(image.get("error").is_none());
        assert_eq!(image["original_size"], serde_json::json!([120, 70]));
        assert_eq!(image["scale"], 1.0);
        let chains = image["detection"]["chains"].as_array().unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0]["components"], serde_json::json!([0, 1, 2, 3]));
        assert_eq!(image["ocr"]["accepted"].as_array().unwrap().len(), 1);
    }
}

#[test]
fn wide_images_are_downscaled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.png");
    RgbImage::from_pixel(200, 50, Rgb([255, 255, 255]))
        .save(&path)
        .unwrap();

    let output = bibnumber()
        .args(["detect", "--max-width", "100", "--input"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let image = &report["images"][0];
    assert_eq!(image["scale"], 0.5);
    assert_eq!(image["detection"]["stats"]["width"], 100);
    assert_eq!(image["detection"]["stats"]["height"], 25);
    assert!(report["params"].is_null());
}

#[test]
fn unreadable_image_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.jpg"), b"definitely not a jpeg").unwrap();
    write_bars(&dir.path().join("ok.png"));

    let output = bibnumber()
        .args(["detect", "--input"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let images = report["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert!(images[0]["error"].is_string());
    assert!(images[0].get("detection").is_none());
    assert!(images[1].get("error").is_none());
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.json");
    std::fs::write(&config, "{ \"min_chain_len\": \"three\" }").unwrap();
    write_bars(&dir.path().join("ok.png"));

    bibnumber()
        .args(["detect", "--input"])
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config").and(predicate::str::contains("bad.json")));
}

#[test]
fn default_config_prints_the_preset() {
    bibnumber()
        .args(["default-config", "--preset", "verification", "--height", "1000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"min_chain_len\": 2"))
        .stdout(predicate::str::contains("\"model_verif_min_height\": 15"))
        .stdout(predicate::str::contains("\"border_margin\": 5"));
}
