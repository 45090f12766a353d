// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standard ASCII vector format.
//!
//! An optional header of `KEY: value` lines ends with `VERTI:`. Each record
//! then starts with `TYPE n_coords [n_cats]`, where TYPE is one of
//! `P L B C F K` (lowercase marks a dead record), followed by one `x y [z]`
//! line per vertex and one `field cat` line per category.

use std::fmt::Write as _;

use grass_lite_topology::{Error, LineCats, LinePoints, LineType, Result};

const HEADER_END: &str = "VERTI:";

#[derive(Debug, Clone)]
pub struct AsciiRecord {
    pub ty: LineType,
    pub alive: bool,
    pub points: LinePoints,
    pub cats: LineCats,
}

#[derive(Debug, Clone, Default)]
pub struct AsciiMap {
    pub header: Vec<(String, String)>,
    pub records: Vec<AsciiRecord>,
}

fn type_code(ty: LineType) -> char {
    match ty {
        LineType::Point => 'P',
        LineType::Line => 'L',
        LineType::Boundary => 'B',
        LineType::Centroid => 'C',
        LineType::Face => 'F',
        LineType::Kernel => 'K',
    }
}

fn parse_type(token: &str) -> Option<(LineType, bool)> {
    let mut chars = token.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let ty = LineType::ALL
        .into_iter()
        .find(|ty| type_code(*ty) == c.to_ascii_uppercase())?;
    Some((ty, c.is_ascii_uppercase()))
}

fn parse_err(line: usize, reason: impl Into<String>) -> Error {
    Error::Parse {
        line,
        reason: reason.into(),
    }
}

fn number<T: std::str::FromStr>(token: &str, line: usize, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| parse_err(line, format!("bad {what} '{token}'")))
}

/// Parses a standard ASCII document. Z values are read only when `with_z`.
pub fn parse_standard(text: &str, with_z: bool) -> Result<AsciiMap> {
    let all: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .collect();

    let mut map = AsciiMap::default();
    let body_start = match all.iter().position(|(_, l)| *l == HEADER_END) {
        Some(end) => {
            for (_, l) in &all[..end] {
                if let Some((key, value)) = l.split_once(':') {
                    map.header.push((key.trim().to_string(), value.trim().to_string()));
                }
            }
            end + 1
        }
        None => 0,
    };

    let mut lines = all[body_start..].iter().filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));
    while let Some(&(n, head)) = lines.next() {
        let tokens: Vec<&str> = head.split_whitespace().collect();
        if tokens.len() < 2 || tokens.len() > 3 {
            return Err(parse_err(n, format!("expected 'TYPE n_coords [n_cats]', got '{head}'")));
        }
        let (ty, alive) = parse_type(tokens[0])
            .ok_or_else(|| parse_err(n, format!("unknown record type '{}'", tokens[0])))?;
        let n_coords: usize = number(tokens[1], n, "coordinate count")?;
        let n_cats: usize = match tokens.get(2) {
            Some(t) => number(t, n, "category count")?,
            None => 0,
        };

        let mut points = LinePoints::new();
        for _ in 0..n_coords {
            let &(n, l) = lines
                .next()
                .ok_or_else(|| parse_err(n, "input ends inside coordinate list"))?;
            let xyz: Vec<&str> = l.split_whitespace().collect();
            if xyz.len() < 2 || xyz.len() > 3 {
                return Err(parse_err(n, format!("expected 'x y [z]', got '{l}'")));
            }
            let x = number(xyz[0], n, "x")?;
            let y = number(xyz[1], n, "y")?;
            let z = match (with_z, xyz.get(2)) {
                (true, Some(t)) => number(t, n, "z")?,
                _ => 0.0,
            };
            points.push(x, y, z);
        }

        let mut cats = LineCats::new();
        for _ in 0..n_cats {
            let &(n, l) = lines
                .next()
                .ok_or_else(|| parse_err(n, "input ends inside category list"))?;
            let fc: Vec<&str> = l.split_whitespace().collect();
            if fc.len() != 2 {
                return Err(parse_err(n, format!("expected 'field cat', got '{l}'")));
            }
            cats.add(number(fc[0], n, "field")?, number(fc[1], n, "category")?);
        }

        map.records.push(AsciiRecord {
            ty,
            alive,
            points,
            cats,
        });
    }
    Ok(map)
}

/// Writes records in standard ASCII, header first when non-empty.
pub fn write_standard(map: &AsciiMap, with_z: bool) -> String {
    let mut out = String::new();
    if !map.header.is_empty() {
        for (key, value) in &map.header {
            let _ = writeln!(out, "{key}: {value}");
        }
        let _ = writeln!(out, "{HEADER_END}");
    }
    for rec in &map.records {
        let code = type_code(rec.ty);
        let code = if rec.alive { code } else { code.to_ascii_lowercase() };
        if rec.cats.is_empty() {
            let _ = writeln!(out, "{code} {}", rec.points.len());
        } else {
            let _ = writeln!(out, "{code} {} {}", rec.points.len(), rec.cats.len());
        }
        for p in rec.points.iter() {
            if with_z {
                let _ = writeln!(out, " {} {} {}", p.x, p.y, p.z);
            } else {
                let _ = writeln!(out, " {} {}", p.x, p.y);
            }
        }
        for (field, cat) in rec.cats.iter() {
            let _ = writeln!(out, " {field} {cat}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SQUARE: &str = "\
ORGANIZATION: test
DIGIT DATE:   today
MAP SCALE:    1
VERTI:
B  5
 0 0
 10 0
 10 10
 0 10
 0 0
C  1 1
 5 5
 1 42
l  2
 20 0
 30 0
";

    #[test]
    fn parses_header_and_records() {
        let map = parse_standard(SQUARE, false).unwrap();
        assert_eq!(map.header.len(), 3);
        assert_eq!(map.header[0], ("ORGANIZATION".to_string(), "test".to_string()));
        assert_eq!(map.records.len(), 3);

        let boundary = &map.records[0];
        assert_eq!(boundary.ty, LineType::Boundary);
        assert_eq!(boundary.points.len(), 5);
        assert!(boundary.cats.is_empty());

        let centroid = &map.records[1];
        assert_eq!(centroid.ty, LineType::Centroid);
        assert_eq!(centroid.cats.get(1), Some(42));

        assert_eq!(map.records[2].ty, LineType::Line);
        assert!(!map.records[2].alive);
    }

    #[test]
    fn headerless_input_and_z() {
        let map = parse_standard("P 1\n 1.5 2.5 3.5\n", true).unwrap();
        let p = map.records[0].points.first().copied().unwrap();
        assert_relative_eq!(p.z, 3.5);

        let flat = parse_standard("P 1\n 1.5 2.5 3.5\n", false).unwrap();
        assert_eq!(flat.records[0].points.first().unwrap().z, 0.0);
    }

    #[test]
    fn errors_name_the_line() {
        // a short record is reported at its header line
        let err = parse_standard("L 2\n 0 0\n", false).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }), "{err}");

        let err = parse_standard("VERTI:\nX 1\n 0 0\n", false).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }), "{err}");

        let err = parse_standard("P 1\n 0 north\n", false).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn written_text_parses_back() {
        let map = parse_standard(SQUARE, false).unwrap();
        let text = write_standard(&map, false);
        assert!(text.contains("C 1 1\n 5 5\n 1 42\n"));
        let again = parse_standard(&text, false).unwrap();
        assert_eq!(again.header, map.header);
        assert_eq!(again.records.len(), map.records.len());
        assert_eq!(again.records[0].points, map.records[0].points);
    }
}
