//! Board URL normalization
//!
//! `https://trello.com/b/<id>/<slug>` and the bare `<id>` name the same board.
//! The id is the path segment right after `/b/`; everything after it (slug,
//! query, fragment) is ignored.

use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::alphanumeric1;
use nom::combinator::opt;
use nom::sequence::preceded;
use nom::{IResult, Parser};

fn board_path(input: &str) -> IResult<&str, &str> {
    preceded(
        (
            alt((tag_no_case("https://"), tag_no_case("http://"))),
            opt(tag_no_case("www.")),
            tag_no_case("trello.com/b/"),
        ),
        alphanumeric1,
    )
    .parse(input)
}

/// Extract the board id from a board URL, if the URL has the known shape
pub fn board_id_from_url(url: &str) -> Option<&str> {
    board_path(url.trim()).ok().map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_with_slug() {
        assert_eq!(
            board_id_from_url("https://trello.com/b/abc123/projeto-alpha"),
            Some("abc123")
        );
    }

    #[test]
    fn test_bare_url_and_www() {
        assert_eq!(board_id_from_url("http://www.trello.com/b/XyZ9"), Some("XyZ9"));
    }

    #[test]
    fn test_id_case_is_preserved() {
        assert_eq!(
            board_id_from_url("HTTPS://Trello.com/b/AbC123?filter=open"),
            Some("AbC123")
        );
    }

    #[test]
    fn test_other_paths_rejected() {
        assert_eq!(board_id_from_url("https://trello.com/c/abc123"), None);
        assert_eq!(board_id_from_url("https://example.com/b/abc123"), None);
        assert_eq!(board_id_from_url("abc123"), None);
    }
}
