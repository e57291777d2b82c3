//! Statement element parser for in/out/arg statements.
//!
//! An element is a label with optional suffix notation:
//!
//! * `name`     - no suffix
//! * `name2` / `name_2` - literal suffix id 2
//! * `name_`    - iterating; base and count inferred from context
//! * `name_5_3` - iterating; base suffix 5, count 3
//!
//! The notation anchors on the *last* underscore and on trailing digits,
//! so it is parsed right-to-left by hand. An underscore followed by
//! anything but digits is part of the label (`audio_in` is one label).

use crate::error::{Error, Result};

/// One parsed statement element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IoEle {
    pub label: String,
    /// Literal base suffix id, if one was written.
    pub base_sfx_id: Option<u32>,
    /// Literal iteration count, if one was written.
    pub sfx_id_count: Option<u32>,
    /// The element takes part in iteration (`name_` or `name_5_3`).
    pub is_iter: bool,
    /// A suffix of any kind was written (distinguishes `name0` from `name`).
    pub has_sfx: bool,
}

/// Strip trailing digits from `s`, returning the remaining head and the
/// parsed number, if any digits were present.
fn split_trailing_digits(s: &str) -> Result<(&str, Option<u32>)> {
    let head_len = s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if head_len == s.len() {
        return Ok((s, None));
    }
    let n = s[head_len..]
        .parse()
        .map_err(|_| Error::syntax(format!("the suffix number in '{s}' does not fit")))?;
    Ok((&s[..head_len], Some(n)))
}

/// Parse one element. `allow_empty` admits the local-proc position of an
/// in-statement, which has no label of its own (`.var`, `_.var`).
pub fn parse_ele(id: &str, allow_empty: bool) -> Result<IoEle> {
    let mut ele = IoEle::default();

    if id.is_empty() {
        if allow_empty {
            return Ok(ele);
        }
        return Err(Error::syntax("a blank statement element was encountered".to_string()));
    }

    let mut s = id;

    if let Some(head) = s.strip_suffix('_') {
        // trailing underscore: iterating element
        ele.is_iter = true;
        ele.has_sfx = true;
        s = head;
        let (head, base) = split_trailing_digits(s)?;
        if base.is_some() {
            ele.base_sfx_id = base;
            s = head.strip_suffix('_').unwrap_or(head);
        }
    } else {
        let (head, last_num) = split_trailing_digits(s)?;
        if let Some(last_num) = last_num {
            ele.has_sfx = true;
            let head = head.strip_suffix('_').unwrap_or(head);
            let (head2, first_num) = split_trailing_digits(head)?;
            if let Some(first_num) = first_num {
                // two numbers: base then count (`name_5_3`, `name5_3`)
                if last_num == 0 {
                    return Err(Error::syntax(format!(
                        "the iteration count in '{id}' must be greater than zero"
                    )));
                }
                ele.is_iter = true;
                ele.base_sfx_id = Some(first_num);
                ele.sfx_id_count = Some(last_num);
                s = head2.strip_suffix('_').unwrap_or(head2);
            } else {
                // one number: literal base suffix (`name2`, `name_2`)
                ele.base_sfx_id = Some(last_num);
                s = head;
            }
        }
    }

    if s.is_empty() {
        if allow_empty && ele.is_iter && ele.base_sfx_id.is_none() {
            // a bare `_` local-proc marker
            return Ok(ele);
        }
        return Err(Error::syntax(format!(
            "the element '{id}' has no label before its suffix"
        )));
    }

    ele.label = s.to_string();
    Ok(ele)
}

/// Parse the local side of an in/out statement: `[proc_marker.]var`.
/// The proc marker names no proc (the statement already belongs to one);
/// it only carries the poly iteration underscore.
pub fn parse_local(s: &str) -> Result<(IoEle, IoEle)> {
    match s.split_once('.') {
        Some((p, v)) => Ok((parse_ele(p, true)?, parse_ele(v, false)?)),
        None => Ok((IoEle::default(), parse_ele(s, false)?)),
    }
}

/// Parse the remote side of an in/out statement: `[net.]proc.var`.
/// `_` as the net label addresses the top-level network.
pub fn parse_remote(s: &str) -> Result<(Option<String>, IoEle, IoEle)> {
    let parts: Vec<&str> = s.split('.').collect();
    match parts.as_slice() {
        [p, v] => Ok((None, parse_ele(p, false)?, parse_ele(v, false)?)),
        [n, p, v] => {
            if n.is_empty() {
                return Err(Error::syntax(format!("empty net label in '{s}'")));
            }
            Ok((Some(n.to_string()), parse_ele(p, false)?, parse_ele(v, false)?))
        }
        _ => Err(Error::syntax(format!(
            "the statement side '{s}' must have the form [net.]proc.var"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_label() {
        let e = parse_ele("osc", false).unwrap();
        assert_eq!(e.label, "osc");
        assert!(!e.is_iter && !e.has_sfx);
        assert_eq!(e.base_sfx_id, None);
    }

    #[test]
    fn test_underscore_inside_label_is_not_iteration() {
        let e = parse_ele("audio_in", false).unwrap();
        assert_eq!(e.label, "audio_in");
        assert!(!e.is_iter && !e.has_sfx);
    }

    #[test]
    fn test_literal_suffix_attached_and_separated() {
        for id in ["osc2", "osc_2"] {
            let e = parse_ele(id, false).unwrap();
            assert_eq!(e.label, "osc", "{id}");
            assert_eq!(e.base_sfx_id, Some(2));
            assert!(e.has_sfx && !e.is_iter);
        }
    }

    #[test]
    fn test_bare_iteration() {
        let e = parse_ele("out_", false).unwrap();
        assert_eq!(e.label, "out");
        assert!(e.is_iter);
        assert_eq!(e.base_sfx_id, None);
        assert_eq!(e.sfx_id_count, None);
    }

    #[test]
    fn test_iterating_with_base_suffix() {
        let e = parse_ele("out2_", false).unwrap();
        assert_eq!(e.label, "out");
        assert!(e.is_iter);
        assert_eq!(e.base_sfx_id, Some(2));
    }

    #[test]
    fn test_base_and_count() {
        for id in ["out_5_3", "out5_3"] {
            let e = parse_ele(id, false).unwrap();
            assert_eq!(e.label, "out", "{id}");
            assert_eq!(e.base_sfx_id, Some(5));
            assert_eq!(e.sfx_id_count, Some(3));
            assert!(e.is_iter);
        }
    }

    #[test]
    fn test_zero_count_rejected() {
        assert!(parse_ele("out_5_0", false).is_err());
    }

    #[test]
    fn test_all_digit_label_rejected() {
        assert!(parse_ele("123", false).is_err());
        assert!(parse_ele("7_", false).is_err());
        assert!(parse_ele("5_3", false).is_err());
    }

    #[test]
    fn test_local_side() {
        let (p, v) = parse_local("in_").unwrap();
        assert_eq!(p, IoEle::default());
        assert!(v.is_iter);

        let (p, v) = parse_local("_.in").unwrap();
        assert!(p.is_iter);
        assert_eq!(v.label, "in");
    }

    #[test]
    fn test_remote_side() {
        let (net, p, v) = parse_remote("split.out_").unwrap();
        assert!(net.is_none());
        assert_eq!(p.label, "split");
        assert!(v.is_iter);

        let (net, p, v) = parse_remote("_.osc0.out").unwrap();
        assert_eq!(net.as_deref(), Some("_"));
        assert_eq!(p.base_sfx_id, Some(0));
        assert_eq!(v.label, "out");
    }
}
