//! Fixtures shared by the integration tests.
//!
//! Images are tiny PNGs whose top-left pixel encodes the embedding: red picks
//! the plane (0 → alpha, 255 → beta, anything else → halfway between) and
//! green is an angle in degrees within that plane.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use exemplar_core::{
    CategoryLayout, Config, EmbeddingProvider, ExperimentContext, ExtractionError,
};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

pub const ALPHA: u8 = 0;
pub const BETA: u8 = 255;
pub const BETWEEN: u8 = 128;

pub const SUPPORT_ANGLES: [u8; 5] = [0, 10, 20, 30, 40];
pub const QUERY_ANGLES: [u8; 5] = [5, 15, 25, 70, 80];

pub struct AnglePlaneProvider;

impl EmbeddingProvider for AnglePlaneProvider {
    fn model_id(&self) -> &str {
        "angle-plane"
    }

    fn embed(&self, image: &DynamicImage, _path: &Path) -> Result<Vec<f32>, ExtractionError> {
        let pixel = image.get_pixel(0, 0);
        let angle = (pixel[1] as f32).to_radians();
        let (c, s) = (angle.cos(), angle.sin());
        Ok(match pixel[0] {
            ALPHA => vec![c, s, 0.0, 0.0],
            BETA => vec![0.0, 0.0, c, s],
            _ => vec![c, s, c, s],
        })
    }
}

pub fn write_png(path: &Path, plane: u8, angle: u8) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(4, 4, Rgb([plane, angle, 0]))
        .save(path)
        .unwrap();
}

/// A category with a `shot_5` pool of two classes and a query corpus holding
/// both classes plus an `unknown_background` folder.
pub fn build_category(root: &Path) -> CategoryLayout {
    let layout = CategoryLayout::new(root.join("birds"));
    let pool = layout.support_root().join("shot_5");
    let queries = layout.query_root();

    for (class, plane) in [("alpha", ALPHA), ("beta", BETA)] {
        for angle in SUPPORT_ANGLES {
            write_png(&pool.join(class).join(format!("s{angle:02}.png")), plane, angle);
        }
        for angle in QUERY_ANGLES {
            write_png(&queries.join(class).join(format!("q{angle:02}.png")), plane, angle);
        }
    }
    for angle in [10u8, 20, 30] {
        write_png(
            &queries.join("unknown_background").join(format!("u{angle:02}.png")),
            BETWEEN,
            angle,
        );
    }
    layout
}

pub fn context() -> ExperimentContext {
    ExperimentContext::initialize(Config::default(), Arc::new(AnglePlaneProvider)).unwrap()
}

pub fn context_with(config: Config) -> ExperimentContext {
    ExperimentContext::initialize(config, Arc::new(AnglePlaneProvider)).unwrap()
}
