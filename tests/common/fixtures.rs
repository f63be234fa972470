//! Feed documents and image generators

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Build a feed whose entries point their icons at `icon_base`
///
/// Entry `i` gets the icon URL `{icon_base}/icons/{i}.png`, except every entry listed in
/// `without_icon`, which has no `im:image` element at all.
pub fn feed_document(icon_base: &str, entries: usize, without_icon: &[usize]) -> String {
    let mut feed = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:im="http://itunes.apple.com/rss" xmlns="http://www.w3.org/2005/Atom">
  <title>Top Paid Applications</title>
"#,
    );
    for i in 0..entries {
        feed.push_str("  <entry>\n");
        feed.push_str(&format!("    <id>https://apps.example.com/app/{i}</id>\n"));
        feed.push_str(&format!("    <im:name>App &amp; Co {i}</im:name>\n"));
        feed.push_str(&format!("    <im:artist>Studio {i}</im:artist>\n"));
        if !without_icon.contains(&i) {
            feed.push_str(&format!(
                "    <im:image height=\"53\">{icon_base}/icons/{i}.png</im:image>\n"
            ));
        }
        feed.push_str("  </entry>\n");
    }
    feed.push_str("</feed>\n");
    feed
}

/// Encode a solid-colour PNG
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("PNG encoding into memory cannot fail");
    buf.into_inner()
}
