use imager::{Align, Color, CropPolicy, ImagerResult, RasterImage, ResampleQuality};
use imager::{Font, TextMeasurer, TextRenderer, TextStyle};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "imager_compose_{}_{}_{name}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn solid(width: u32, height: u32, color: Color) -> RasterImage {
    let mut img = RasterImage::new(width, height).unwrap();
    img.fill(color);
    img
}

/// Flat 30x10 box regardless of input, in GD corner order.
struct FixedBox;

impl TextMeasurer for FixedBox {
    fn measure(
        &self,
        _size: f64,
        _angle_deg: f64,
        _font: &Font,
        _text: &str,
    ) -> ImagerResult<[f64; 8]> {
        Ok([0.0, 2.0, 30.0, 2.0, 30.0, -8.0, 0.0, -8.0])
    }
}

/// Stamps a 1x1 marker at the requested origin instead of rasterizing
/// glyphs, so placement is observable without font fixtures.
struct MarkerRenderer;

impl TextRenderer for MarkerRenderer {
    fn render(
        &self,
        surface: &mut imager::Surface,
        _style: &TextStyle,
        x: i64,
        y: i64,
    ) -> ImagerResult<()> {
        let marker = {
            let mut s = imager::Surface::new(1, 1)?;
            s.fill(image::Rgba([255, 0, 255, 255]));
            s
        };
        surface.copy_region(&marker, 0, 0, 1, 1, x, y);
        Ok(())
    }
}

fn stub_font() -> Font {
    let path = temp_path("font.ttf");
    std::fs::write(&path, b"stub").unwrap();
    Font::resolve(&path).unwrap()
}

#[test]
fn full_pipeline_crop_border_append_write_save() {
    let white = Color::rgb(255, 255, 255).unwrap();
    let blue = Color::from_hex("#0000FF").unwrap();
    let red = Color::rgb(255, 0, 0).unwrap();

    let mut img = solid(300, 300, blue);
    img.set_quality(ResampleQuality::Smooth);

    // Wider target letterboxes via FitHeight on the horizontal axis.
    img.crop(400, 200, CropPolicy::FitHeight, Some(white)).unwrap();
    assert_eq!((img.width(), img.height()), (400, 200));

    img.border(5, 5, 5, 5, Some(red)).unwrap();
    assert_eq!((img.width(), img.height()), (410, 210));
    assert_eq!(img.surface().pixel(0, 0).0, [255, 0, 0, 255]);

    let patch = solid(20, 20, red);
    img.append(&patch, 10, 10);
    assert_eq!(img.surface().pixel(15, 15).0, [255, 0, 0, 255]);

    let style = TextStyle::new("caption", 14.0, 0.0, red, stub_font(), &FixedBox).unwrap();
    img.write(&MarkerRenderer, &style, 400, 100, Align::Right).unwrap();
    // Right alignment anchors the run's right edge at x = 400 for the
    // 30px-wide box, so the origin marker lands at 370.
    assert_eq!(img.surface().pixel(370, 100).0, [255, 0, 255, 255]);

    let out = temp_path("out.jpg");
    img.save(&out).unwrap();
    let bytes = std::fs::read(&out).unwrap();
    let reloaded = RasterImage::from_bytes(&bytes).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (410, 210));
    let _ = std::fs::remove_file(&out);
}

#[test]
fn failed_transform_leaves_prior_state_intact() {
    let blue = Color::rgb(0, 0, 255).unwrap();
    let mut img = solid(120, 80, blue);

    assert!(img.scale(-2.0).is_err());
    assert!(img.crop(0, 50, CropPolicy::Auto, None).is_err());

    assert_eq!((img.width(), img.height()), (120, 80));
    assert_eq!(img.surface().pixel(60, 40).0, [0, 0, 255, 255]);
}

#[test]
fn from_file_round_trips_through_the_filesystem() {
    let green = Color::rgb(0, 200, 0).unwrap();
    let src = solid(40, 30, green);

    let path = temp_path("src.jpg");
    src.save(&path).unwrap();

    let loaded = RasterImage::from_file(&path).unwrap();
    assert_eq!((loaded.width(), loaded.height()), (40, 30));

    assert!(RasterImage::from_file(temp_path("missing.jpg")).is_err());
    let _ = std::fs::remove_file(&path);
}
