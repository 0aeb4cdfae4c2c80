pub const PUZZLE_SYSTEM: &str = include_str!("../data/prompts/puzzle_system.txt");
pub const PUZZLE_USER: &str = include_str!("../data/prompts/puzzle_user.txt");

/// Difficulty used when the request does not name one.
pub const DEFAULT_DIFFICULTY: &str = "medium";

/// Replace `{{key}}` placeholders in a template string.
///
/// Substitution is a single pass over the template, so placeholder text inside
/// a value is left as is. Unknown placeholders are kept verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, end))
        });

        match value {
            Some((value, end)) => {
                result.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                result.push_str("{{");
                rest = after;
            }
        }
    }

    result.push_str(rest);
    result
}

/// Instruction asking the text model for one puzzle on `topic`.
pub fn build_prompt(topic: &str, difficulty: &str) -> String {
    let difficulty = match difficulty.trim() {
        "" => DEFAULT_DIFFICULTY,
        d => d,
    };
    render(PUZZLE_USER, &[("topic", topic), ("difficulty", difficulty)])
}
