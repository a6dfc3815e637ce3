//! Currency display with Indian digit grouping (12,34,56,789).

pub const CURRENCY_SYMBOL: &str = "₹";

/// Formats `value` rounded to whole units with the currency symbol.
pub fn to_currency(value: f64) -> String {
    format!("{} {}", CURRENCY_SYMBOL, group_indian(value))
}

/// Rounds to whole units and groups the last three digits, then pairs.
pub fn group_indian(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    if digits.len() <= 3 {
        return format!("{sign}{digits}");
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("{sign}{},{tail}", groups.join(","))
}
