//! LRC lyric parsing and cue lookup
//!
//! Parses synchronized lyrics in LRC format:
//! [mm:ss.cc] Lyrics line here
//!
//! Example:
//! [00:12.34] Hello world
//! [00:15.00] Another line

/// A single lyric line with the time (in seconds) at which it becomes active.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Seconds from the start of the track, never negative.
    pub time_secs: f64,
    /// The lyric text, never empty.
    pub text: String,
}

impl Cue {
    pub fn new(time_secs: f64, text: String) -> Self {
        Self { time_secs, text }
    }
}

/// Parse an LRC-style lyric blob into cues sorted ascending by timestamp.
///
/// Lines without a parseable leading timestamp tag are dropped, as are lines
/// whose text is empty after the tags are stripped. Metadata tags like
/// `[ti:Title]` have no numeric timestamp and fall out naturally. Malformed
/// input only ever degrades to fewer cues.
pub fn parse_lyrics(content: &str) -> Vec<Cue> {
    let mut cues = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(parsed) = parse_timed_line(line) {
            cues.extend(parsed);
        }
    }

    // Stable sort keeps same-timestamp lines in input order.
    cues.sort_by(|a, b| a.time_secs.total_cmp(&b.time_secs));
    cues
}

/// Find the active cue at time `t`: the greatest cue with `time_secs <= t`.
///
/// A reverse linear scan is fine here; real tracks carry at most a few
/// hundred cues.
pub fn cue_at(cues: &[Cue], t: f64) -> Option<&Cue> {
    cues.iter().rev().find(|c| c.time_secs <= t)
}

/// Parse a timed line like `[00:12.34]Text` or `[00:12.34][00:15.00]Text`.
fn parse_timed_line(line: &str) -> Option<Vec<Cue>> {
    let mut timestamps = Vec::new();
    let mut pos = 0;

    // Collect all timestamp tags at the beginning of the line.
    while line[pos..].starts_with('[') {
        let Some(end) = line[pos..].find(']') else {
            break;
        };
        let tag = &line[pos + 1..pos + end];
        if let Some(secs) = parse_timestamp(tag) {
            timestamps.push(secs);
            pos += end + 1;
        } else {
            break;
        }
    }

    if timestamps.is_empty() {
        return None;
    }

    let text = line[pos..].trim();
    if text.is_empty() {
        return None;
    }

    Some(
        timestamps
            .into_iter()
            .map(|ts| Cue::new(ts, text.to_string()))
            .collect(),
    )
}

/// Parse a timestamp like "00:12", "00:12.34" or "00:12.345" into seconds.
fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split([':', '.']).collect();

    match parts.len() {
        2 => {
            let min: u32 = parts[0].parse().ok()?;
            let sec: u32 = parts[1].parse().ok()?;
            Some(f64::from(min) * 60.0 + f64::from(sec))
        }
        3 => {
            let min: u32 = parts[0].parse().ok()?;
            let sec: u32 = parts[1].parse().ok()?;
            let frac_str = parts[2];
            // "34" is centiseconds, "345" milliseconds.
            let frac: f64 = match frac_str.len() {
                1 => f64::from(frac_str.parse::<u32>().ok()?) / 10.0,
                2 => f64::from(frac_str.parse::<u32>().ok()?) / 100.0,
                3 => f64::from(frac_str.parse::<u32>().ok()?) / 1000.0,
                _ => return None,
            };
            Some(f64::from(min) * 60.0 + f64::from(sec) + frac)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:12"), Some(12.0));
        assert_eq!(parse_timestamp("01:30"), Some(90.0));
        assert_eq!(parse_timestamp("00:12.34"), Some(12.34));
        assert_eq!(parse_timestamp("00:12.340"), Some(12.34));
        assert_eq!(parse_timestamp("garbage"), None);
        assert_eq!(parse_timestamp("ti:Title"), None);
    }

    #[test]
    fn test_parse_lrc() {
        let lrc = "\n[ti:Test Song]\n[ar:Test Artist]\n[00:12.34]First line\n[00:15.00]Second line\n";
        let cues = parse_lyrics(lrc);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].time_secs, 12.34);
        assert_eq!(cues[0].text, "First line");
        assert_eq!(cues[1].text, "Second line");
    }

    #[test]
    fn test_drops_empty_text_and_untagged_lines() {
        let lrc = "[00:01.00]\nplain line without tag\n[00:02.00]   \n[00:03.00]kept";
        let cues = parse_lyrics(lrc);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "kept");
    }

    #[test]
    fn test_output_is_sorted_and_nonempty() {
        let lrc = "[00:30.00]later\n[00:10.00]earlier\n[00:20.00]middle";
        let cues = parse_lyrics(lrc);
        assert!(cues.windows(2).all(|w| w[0].time_secs <= w[1].time_secs));
        assert!(cues.iter().all(|c| !c.text.is_empty()));
        assert_eq!(cues[0].text, "earlier");
    }

    #[test]
    fn test_repeated_tags_emit_one_cue_each() {
        let cues = parse_lyrics("[00:05.00][00:25.00]chorus");
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].time_secs, 5.0);
        assert_eq!(cues[1].time_secs, 25.0);
        assert_eq!(cues[1].text, "chorus");
    }

    #[test]
    fn test_idempotent() {
        let lrc = "[00:12.34]a\n[00:01.00]b\n[00:12.34]c";
        assert_eq!(parse_lyrics(lrc), parse_lyrics(lrc));
    }

    #[test]
    fn test_cue_at() {
        let cues = parse_lyrics("[00:10.00]one\n[00:20.00]two\n[00:30.00]three");
        assert!(cue_at(&cues, 5.0).is_none());
        assert_eq!(cue_at(&cues, 10.0).unwrap().text, "one");
        assert_eq!(cue_at(&cues, 19.99).unwrap().text, "one");
        assert_eq!(cue_at(&cues, 20.0).unwrap().text, "two");
        assert_eq!(cue_at(&cues, 500.0).unwrap().text, "three");
        assert!(cue_at(&[], 10.0).is_none());
    }
}
