//! English inflection helpers for kind and foreign-key derivation.
//!
//! Only the rules needed to turn entity type names into storage names are
//! implemented: CamelCase splitting, regular plural/singular suffixes and a
//! short list of irregular and uncountable nouns.

const IRREGULARS: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("ox", "oxen"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("movie", "movies"),
    ("cookie", "cookies"),
    ("calorie", "calories"),
    ("zombie", "zombies"),
];

/// Nouns ending in `us` whose plural adds `es`.
const US_NOUNS: &[&str] = &[
    "bus", "status", "virus", "campus", "bonus", "census", "circus", "chorus", "nexus", "plus",
    "walrus", "apparatus", "prospectus",
];

const UNCOUNTABLES: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "news",
    "metadata",
];

/// Converts `CamelCase` (or `mixedCase`) into `snake_case`.
///
/// Acronym runs stay together: `HTTPRequest` -> `http_request`.
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (index, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' {
            push_separator(&mut out);
            continue;
        }
        if c.is_uppercase() {
            let prev = index.checked_sub(1).map(|i| chars[i]);
            let next = chars.get(index + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary {
                push_separator(&mut out);
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

fn push_separator(out: &mut String) {
    if !out.is_empty() && !out.ends_with('_') {
        out.push('_');
    }
}

/// Pluralizes the last `_`-separated word of a snake_case name.
pub fn pluralize(word: &str) -> String {
    inflect_last_word(word, pluralize_word)
}

/// Singularizes the last `_`-separated word of a snake_case name.
pub fn singularize(word: &str) -> String {
    inflect_last_word(word, singularize_word)
}

/// Derives the storage kind for a type name: `BlogPost` -> `blog_posts`.
pub fn tableize(type_name: &str) -> String {
    pluralize(&underscore(type_name))
}

/// Derives the conventional foreign-key column: `Author` / `authors` -> `author_id`.
pub fn foreign_key(name: &str) -> String {
    format!("{}_id", singularize(&underscore(name)))
}

fn inflect_last_word(word: &str, inflect: fn(&str) -> String) -> String {
    match word.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => format!("{head}_{}", inflect(last)),
        _ => inflect(word),
    }
}

fn pluralize_word(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLES.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULARS
        .iter()
        .find(|(singular, plural)| *singular == word || *plural == word)
    {
        return (*plural).to_string();
    }

    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        // Already-plural regular nouns (`posts`) stay as they are.
        if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
            return word.to_string();
        }
        return format!("{word}es");
    }
    format!("{word}s")
}

fn singularize_word(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLES.contains(&word) {
        return word.to_string();
    }
    if let Some((singular, _)) = IRREGULARS
        .iter()
        .find(|(singular, plural)| *plural == word || *singular == word)
    {
        return (*singular).to_string();
    }

    if let Some(stem) = word.strip_suffix("es").filter(|stem| US_NOUNS.contains(stem)) {
        return stem.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{foreign_key, pluralize, singularize, tableize, underscore};

    #[test]
    fn underscores_camel_case_and_acronyms() {
        assert_eq!(underscore("BlogPost"), "blog_post");
        assert_eq!(underscore("HTTPRequest"), "http_request");
        assert_eq!(underscore("post"), "post");
        assert_eq!(underscore("Line2Item"), "line2_item");
    }

    #[test]
    fn pluralizes_regular_and_irregular_words() {
        assert_eq!(pluralize("post"), "posts");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("sheep"), "sheep");
        assert_eq!(pluralize("blog_entry"), "blog_entries");
    }

    #[test]
    fn pluralize_leaves_plural_input_alone() {
        assert_eq!(pluralize("posts"), "posts");
        assert_eq!(pluralize("people"), "people");
    }

    #[test]
    fn singularizes_regular_and_irregular_words() {
        assert_eq!(singularize("posts"), "post");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("blog_posts"), "blog_post");
    }

    #[test]
    fn singularizes_ie_and_us_plurals() {
        assert_eq!(singularize("movies"), "movie");
        assert_eq!(singularize("buses"), "bus");
        assert_eq!(singularize("statuses"), "status");
        assert_eq!(singularize("order_statuses"), "order_status");
        assert_eq!(singularize("houses"), "house");
        assert_eq!(pluralize("movie"), "movies");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(foreign_key("movies"), "movie_id");
        assert_eq!(foreign_key("buses"), "bus_id");
        assert_eq!(foreign_key("Status"), "status_id");
    }

    #[test]
    fn tableize_and_foreign_key_follow_naming_convention() {
        assert_eq!(tableize("BlogPost"), "blog_posts");
        assert_eq!(tableize("Person"), "people");
        assert_eq!(foreign_key("author"), "author_id");
        assert_eq!(foreign_key("posts"), "post_id");
        assert_eq!(foreign_key("BlogPost"), "blog_post_id");
    }
}
