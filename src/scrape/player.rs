//! Player profile page parsing.

use super::error::ScrapeError;
use super::normalize;
use scraper::{Html, Selector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerData {
    pub rating: u32,
    pub season_play_count: u32,
    pub total_play_count: u32,
    pub profile_image_url: Option<String>,
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::parse(format!("bad selector '{}': {}", css, e)))
}

/// Parse the `/playerData` page.
pub fn parse_player_data(html: &str) -> Result<PlayerData, ScrapeError> {
    let document = Html::parse_document(html);

    let rating_text = document
        .select(&selector(".rating_block")?)
        .next()
        .map(|e| e.text().collect::<String>())
        .ok_or_else(|| ScrapeError::parse("missing rating block"))?;
    let rating = normalize::parse_digits(&rating_text)?;

    // "プレイ回数：1,234回" style cells, season then lifetime
    let counts_text = document
        .select(&selector(".m_5.m_b_5.t_r.f_12")?)
        .next()
        .map(|e| e.text().collect::<String>())
        .ok_or_else(|| ScrapeError::parse("missing play count block"))?;
    let fields: Vec<&str> = counts_text.split('：').collect();
    if fields.len() < 3 {
        return Err(ScrapeError::parse(format!(
            "unexpected play count text '{}'",
            counts_text.trim()
        )));
    }
    let season_play_count = normalize::parse_digits(fields[1])?;
    let total_play_count = normalize::parse_digits(fields[2])?;

    let profile_image_url = document
        .select(&selector("img.w_112.f_l")?)
        .find_map(|img| img.value().attr("src"))
        .map(str::to_string);

    Ok(PlayerData {
        rating,
        season_play_count,
        total_play_count,
        profile_image_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rating: &str, counts: &str) -> String {
        format!(
            r#"<html><body>
            <img class="w_112 f_l" src="https://example.jp/img/icon/player7.png" />
            <div class="rating_block">{}</div>
            <div class="m_5 m_b_5 t_r f_12">{}</div>
            </body></html>"#,
            rating, counts
        )
    }

    #[test]
    fn parses_player_page() {
        let html = page(
            "15210",
            "プレイ回数：32回<br>累計プレイ回数：1,204回",
        );
        let data = parse_player_data(&html).unwrap();
        assert_eq!(data.rating, 15210);
        assert_eq!(data.season_play_count, 32);
        assert_eq!(data.total_play_count, 1204);
        assert_eq!(
            data.profile_image_url.as_deref(),
            Some("https://example.jp/img/icon/player7.png")
        );
    }

    #[test]
    fn missing_counts_is_a_parse_error() {
        let html = page("15210", "no separators here");
        assert!(matches!(
            parse_player_data(&html),
            Err(ScrapeError::Parse(_))
        ));
    }
}
