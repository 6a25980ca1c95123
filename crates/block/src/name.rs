//! Column naming for fields without an explicit name override.

/// Converts a CamelCase field name to its snake_case column name.
///
/// The scan runs from the end of the name. Each uppercase run gets an
/// underscore before its first letter, and also before its last letter
/// when the run is followed by lowercase, so acronyms stay intact:
/// `HTTPServer` becomes `http_server` and `UserID` becomes `user_id`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let len = chars.len();
    let mut breaks = vec![false; len];

    let mut i = len as isize - 1;
    while i >= 0 {
        if !chars[i as usize].is_uppercase() {
            i -= 1;
            continue;
        }

        let end = i as usize;
        let mut start = 0usize;
        let mut j = i - 1;
        while j >= 0 {
            if chars[j as usize].is_lowercase() {
                start = (j + 1) as usize;
                break;
            }
            j -= 1;
        }

        if end == len - 1 || start == end {
            breaks[start] = true;
        } else {
            breaks[start] = true;
            breaks[end] = true;
        }
        i = j - 1;
    }

    let mut out = String::with_capacity(len + 4);
    for (idx, ch) in chars.into_iter().enumerate() {
        if breaks[idx] && idx != 0 {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}
