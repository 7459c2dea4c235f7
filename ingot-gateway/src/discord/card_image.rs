/// SVG-based member-card-to-PNG renderer for Discord messages.
///
/// Builds a 1000x560 card SVG (tier-colored gradient, guild logo, avatar,
/// balance figures) and rasterizes it via resvg. Avatar and logo are fetched
/// over HTTP and inlined as base64 data URIs; fetch failures degrade to
/// placeholder rendering.
use std::fmt::Write;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::tiny_skia;
use resvg::usvg;
use tracing::warn;

use ingot_core::format_gold;

const WIDTH: f32 = 1000.0;
const HEIGHT: f32 = 560.0;

const LOGO_SIZE: f32 = 170.0;
const AVATAR_SIZE: f32 = 180.0;

/// Font stack - proportional for readability, bold actually renders
const FONT_FAMILY: &str = "'Inter', 'Segoe UI', 'Helvetica Neue', 'Arial', 'Noto Sans', sans-serif";

/// Gradient palette + accent per tier, darkest stop first
struct CardTheme {
    palette: [&'static str; 3],
    accent: &'static str,
}

fn theme_for_tier(tier_name: &str) -> CardTheme {
    match tier_name {
        "Legendary" => CardTheme {
            palette: ["#3b2403", "#7a4a06", "#b8860b"],
            accent: "#f39c12",
        },
        "Epic" => CardTheme {
            palette: ["#1d0b2e", "#3f1d63", "#6a2d9e"],
            accent: "#9b59b6",
        },
        "Rare" => CardTheme {
            palette: ["#06243d", "#0d4a73", "#1769a0"],
            accent: "#3498db",
        },
        _ => CardTheme {
            palette: ["#1f2324", "#343a3b", "#4a5253"],
            accent: "#95a5a6",
        },
    }
}

static SVG_OPTIONS: LazyLock<usvg::Options> = LazyLock::new(|| {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    opt
});

/// Eagerly initialize the system font database.
///
/// The underlying `LazyLock` scans every font file on the system, which can
/// block for seconds on large font collections.  Calling this at startup
/// avoids stalling the tokio runtime on the first card render.
pub(crate) fn init_fonts() {
    LazyLock::force(&SVG_OPTIONS);
}

/// Rewrite a Discord CDN `.webp` URL to its `.png` variant.
///
/// serenity builds avatar and icon URLs with a webp extension, which the SVG
/// rasterizer cannot decode. Animated `.gif` URLs are left alone.
pub(super) fn png_cdn_url(url: &str) -> String {
    match url.split_once('?') {
        Some((path, query)) if path.ends_with(".webp") => {
            format!("{}.png?{}", path.trim_end_matches(".webp"), query)
        }
        None if url.ends_with(".webp") => {
            format!("{}.png", url.trim_end_matches(".webp"))
        }
        _ => url.to_string(),
    }
}

/// resvg decodes only PNG, JPEG, and GIF
fn decodable_image(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x89, b'P', b'N', b'G'])
        || bytes.starts_with(&[0xff, 0xd8, 0xff])
        || bytes.starts_with(b"GIF8")
}

fn data_uri(bytes: &[u8]) -> String {
    let mime = if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        "image/jpeg"
    } else {
        "image/png"
    };
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Fetch an image for inlining; None on any failure
pub(super) async fn fetch_image(url: &str) -> Option<Vec<u8>> {
    let response = match reqwest::get(url).await {
        Ok(r) => r,
        Err(e) => {
            warn!("Image fetch failed for {}: {}", url, e);
            return None;
        }
    };
    if !response.status().is_success() {
        warn!("Image fetch for {} returned {}", url, response.status());
        return None;
    }
    response.bytes().await.ok().map(|b| b.to_vec())
}

/// Render the member card to PNG bytes.
///
/// Returns `None` if rendering fails (missing fonts, pixmap allocation).
pub(super) fn render_member_card(
    username: &str,
    tier_name: &str,
    balance_gold: i64,
    total_spent: i64,
    avatar_png: Option<&[u8]>,
    logo_png: Option<&[u8]>,
) -> Option<Vec<u8>> {
    let svg = build_svg(
        username,
        tier_name,
        balance_gold,
        total_spent,
        avatar_png,
        logo_png,
    );
    match rasterize(&svg) {
        Ok(png) => Some(png),
        Err(e) => {
            warn!("Member card render failed: {e}");
            None
        }
    }
}

fn build_svg(
    username: &str,
    tier_name: &str,
    balance_gold: i64,
    total_spent: i64,
    avatar_png: Option<&[u8]>,
    logo_png: Option<&[u8]>,
) -> String {
    let theme = theme_for_tier(tier_name);
    let avatar_png = avatar_png.filter(|b| {
        let ok = decodable_image(b);
        if !ok {
            warn!("Avatar bytes are not a decodable image; using placeholder");
        }
        ok
    });
    let logo_png = logo_png.filter(|b| {
        let ok = decodable_image(b);
        if !ok {
            warn!("Logo bytes are not a decodable image; using placeholder");
        }
        ok
    });
    let mut s = String::with_capacity(8 * 1024);

    let _ = write!(
        s,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#,
    );

    // Two-panel layout inside the 30px card frame
    let left_x = 48.0;
    let left_w = 430.0;
    let left_y = 48.0;
    let gap = 36.0;
    let right_x = left_x + left_w + gap;
    let right_w = (WIDTH - 60.0) - left_w - gap;

    let avatar_x = right_x + (right_w - AVATAR_SIZE) / 2.0;
    let avatar_y = left_y + 52.0;
    let avatar_cx = avatar_x + AVATAR_SIZE / 2.0;
    let avatar_cy = avatar_y + AVATAR_SIZE / 2.0;
    let _ = write!(
        s,
        r#"<defs><linearGradient id="bg" x1="0" y1="0" x2="1" y2="1">
<stop offset="0" stop-color="{}"/><stop offset="0.6" stop-color="{}"/><stop offset="1" stop-color="{}"/>
</linearGradient>
<clipPath id="avatar-clip"><circle cx="{avatar_cx}" cy="{avatar_cy}" r="{}"/></clipPath></defs>"#,
        theme.palette[0],
        theme.palette[1],
        theme.palette[2],
        AVATAR_SIZE / 2.0,
    );
    let _ = write!(s, r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="url(#bg)"/>"#);

    // Accent circles bleeding off the corners
    let _ = write!(
        s,
        r#"<circle cx="{}" cy="-30" r="200" fill="{}" opacity="0.14"/><circle cx="{}" cy="{}" r="160" fill="{}" opacity="0.14"/>"#,
        WIDTH - 110.0,
        theme.accent,
        WIDTH + 10.0,
        HEIGHT + 10.0,
        theme.accent,
    );

    // Subtle geometric texture
    for i in 0..10 {
        let x = 40.0 + (i as f32) * 100.0;
        let _ = write!(
            s,
            r#"<polygon points="{x},0 {},0 {},120" fill="rgba(255,255,255,0.06)"/>"#,
            x + 120.0,
            x + 40.0,
        );
    }

    // Card frame
    let _ = write!(
        s,
        r#"<rect x="26" y="26" width="{}" height="{}" fill="rgba(0,0,0,0.26)" stroke="rgba(255,255,255,0.45)" stroke-width="2"/>"#,
        WIDTH - 52.0,
        HEIGHT - 52.0,
    );
    let _ = write!(
        s,
        r#"<rect x="30" y="30" width="{}" height="{}" fill="rgba(0,0,0,0.26)" stroke="rgba(255,255,255,0.45)" stroke-width="2"/>"#,
        WIDTH - 60.0,
        HEIGHT - 60.0,
    );

    // Left panel: logo (or placeholder outline), tier, username
    let logo_x = left_x + (left_w - LOGO_SIZE) / 2.0;
    let logo_y = left_y + 64.0;
    match logo_png {
        Some(bytes) => {
            let _ = write!(
                s,
                r#"<image x="{logo_x}" y="{logo_y}" width="{LOGO_SIZE}" height="{LOGO_SIZE}" href="{}"/>"#,
                data_uri(bytes),
            );
        }
        None => {
            let _ = write!(
                s,
                r#"<rect x="{logo_x}" y="{logo_y}" width="{LOGO_SIZE}" height="{LOGO_SIZE}" fill="none" stroke="{}" stroke-width="3"/>"#,
                theme.accent,
            );
        }
    }
    let center_x = left_x + left_w / 2.0;
    let _ = write!(
        s,
        r#"<text x="{center_x}" y="{}" font-family="{FONT_FAMILY}" font-size="42" font-weight="bold" fill="{}" text-anchor="middle">{} Tier</text>"#,
        left_y + 300.0,
        theme.accent,
        xml_escape(tier_name),
    );
    let _ = write!(
        s,
        r#"<text x="{center_x}" y="{}" font-family="{FONT_FAMILY}" font-size="38" font-weight="bold" fill="rgba(255,255,255,0.90)" text-anchor="middle">{}</text>"#,
        left_y + 374.0,
        xml_escape(username),
    );

    // Right panel: circle-clipped avatar with accent ring, then the figures
    if let Some(bytes) = avatar_png {
        let _ = write!(
            s,
            r#"<image x="{avatar_x}" y="{avatar_y}" width="{AVATAR_SIZE}" height="{AVATAR_SIZE}" clip-path="url(#avatar-clip)" href="{}"/>"#,
            data_uri(bytes),
        );
    } else {
        let _ = write!(
            s,
            r#"<circle cx="{avatar_cx}" cy="{avatar_cy}" r="{}" fill="rgba(255,255,255,0.12)" clip-path="url(#avatar-clip)"/>"#,
            AVATAR_SIZE / 2.0,
        );
    }
    let _ = write!(
        s,
        r#"<circle cx="{avatar_cx}" cy="{avatar_cy}" r="{}" fill="none" stroke="{}" stroke-width="6"/>"#,
        AVATAR_SIZE / 2.0 + 2.0,
        theme.accent,
    );

    let label_y1 = avatar_y + AVATAR_SIZE + 64.0;
    let value_y1 = label_y1 + 52.0;
    let label_y2 = value_y1 + 56.0;
    let value_y2 = label_y2 + 52.0;
    for (label, value, ly, vy) in [
        ("Remaining Balance", balance_gold, label_y1, value_y1),
        ("Total Spent Gold", total_spent, label_y2, value_y2),
    ] {
        let _ = write!(
            s,
            r#"<text x="{avatar_cx}" y="{ly}" font-family="{FONT_FAMILY}" font-size="24" font-weight="bold" fill="rgba(255,255,255,0.85)" text-anchor="middle">{label}</text>"#,
        );
        let _ = write!(
            s,
            r#"<text x="{avatar_cx}" y="{vy}" font-family="{FONT_FAMILY}" font-size="46" font-weight="bold" fill="{}" text-anchor="middle">{}</text>"#,
            "#f1f1f1",
            format_gold(value),
        );
    }

    s.push_str("</svg>");
    s
}

fn rasterize(svg_str: &str) -> Result<Vec<u8>, String> {
    let tree = usvg::Tree::from_data(svg_str.as_bytes(), &SVG_OPTIONS)
        .map_err(|e| format!("SVG parse: {e}"))?;

    let size = tree.size().to_int_size();
    let mut pixmap =
        tiny_skia::Pixmap::new(size.width(), size.height()).ok_or("pixmap allocation failed")?;

    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap.encode_png().map_err(|e| format!("PNG encode: {e}"))
}

fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b>&'\""), "a&lt;b&gt;&amp;&apos;&quot;");
    }

    #[test]
    fn test_svg_structure_without_images() {
        let svg = build_svg("buyer<1>", "Legendary", 12_000_000, 55_000_000, None, None);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Legendary Tier"));
        assert!(svg.contains("buyer&lt;1&gt;"));
        assert!(svg.contains("12M"));
        assert!(svg.contains("55M"));
        assert!(svg.contains(r##"fill="#f1f1f1""##));
        // Placeholder outline instead of an <image> logo
        assert!(!svg.contains("<image"));
    }

    #[test]
    fn test_svg_inlines_images() {
        let fake_png = [0x89u8, 0x50, 0x4e, 0x47];
        let svg = build_svg("u", "Rare", 0, 0, Some(&fake_png), Some(&fake_png));
        assert_eq!(svg.matches("data:image/png;base64,").count(), 2);
    }

    #[test]
    fn test_png_cdn_url() {
        assert_eq!(
            png_cdn_url("https://cdn.discordapp.com/avatars/1/a.webp?size=1024"),
            "https://cdn.discordapp.com/avatars/1/a.png?size=1024"
        );
        assert_eq!(
            png_cdn_url("https://cdn.discordapp.com/icons/1/b.webp"),
            "https://cdn.discordapp.com/icons/1/b.png"
        );
        // Animated avatars keep their gif extension
        assert_eq!(
            png_cdn_url("https://cdn.discordapp.com/avatars/1/a_c.gif?size=1024"),
            "https://cdn.discordapp.com/avatars/1/a_c.gif?size=1024"
        );
    }

    #[test]
    fn test_undecodable_image_bytes_fall_back_to_placeholder() {
        let webp = b"RIFF\x24\x00\x00\x00WEBPVP8 ";
        let svg = build_svg("u", "Epic", 0, 0, Some(webp), Some(webp));
        assert!(!svg.contains("<image"));
        // Placeholder logo outline and avatar disc still drawn
        assert!(svg.contains(r#"stroke-width="3""#));

        // The card itself still renders
        let png = render_member_card("u", "Epic", 0, 0, Some(webp), Some(webp));
        assert!(png.is_some());
    }

    #[test]
    fn test_avatar_pixels_land_on_the_card() {
        let mut red = tiny_skia::Pixmap::new(8, 8).expect("pixmap");
        red.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));
        let avatar = red.encode_png().expect("avatar png");

        let card = render_member_card("u", "Rare", 0, 0, Some(&avatar), None).expect("card png");
        let rendered = tiny_skia::Pixmap::decode_png(&card).expect("decodable card");

        // Avatar center per the layout: right panel at x=514, width 474
        let pixel = rendered.pixel(751, 190).expect("in bounds");
        assert!(pixel.red() > 200 && pixel.green() < 60 && pixel.blue() < 60);
    }
}
