// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type-name grammar helpers.
//!
//! Qualified names have the form `Type, Module[, Version=.., Culture=.., PublicKeyToken=..]`.
//! Generic names are written `Base<Arg, Arg>` where an argument may be bracketed
//! (`[Key, app]`) to carry its own module. Array names end with `[]`.

/// Split a qualified name at the first comma outside `<>` / `[]`.
///
/// Returns the type part and, when present, the (non-empty) module part.
#[must_use]
pub fn split_qualified(name: &str) -> (&str, Option<&str>) {
    match top_level_comma(name) {
        Some(idx) => {
            let ty = name[..idx].trim();
            let module = name[idx + 1..].trim();
            (ty, (!module.is_empty()).then_some(module))
        }
        None => (name.trim(), None),
    }
}

/// Canonical module name: version, culture and key metadata stripped.
///
/// `"app, Version=1.0.0.0, Culture=neutral"` becomes `"app"`.
#[must_use]
pub fn canonical_module(module: &str) -> &str {
    module.split(',').next().unwrap_or(module).trim()
}

/// Combine a type name and a module name into a qualified name.
#[must_use]
pub fn qualify(ty: &str, module: &str) -> String {
    format!("{}, {}", ty, module)
}

/// Element name of an array type name (`"Foo[]"` -> `"Foo"`).
#[must_use]
pub fn array_element(name: &str) -> Option<&str> {
    let element = name.trim().strip_suffix("[]")?.trim_end();
    (!element.is_empty()).then_some(element)
}

/// Open generic definition name for `base` with `arity` parameters (`Map<,>`).
#[must_use]
pub fn open_generic_name(base: &str, arity: usize) -> String {
    format!("{}<{}>", base, ",".repeat(arity.saturating_sub(1)))
}

/// A generic type name split into its base and argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericName<'a> {
    pub base: &'a str,
    pub arguments: Vec<&'a str>,
}

impl GenericName<'_> {
    /// True for definitions such as `Map<,>` where no argument is bound.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.arguments.iter().all(|arg| arg.is_empty())
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Name of the matching open definition.
    #[must_use]
    pub fn definition_name(&self) -> String {
        open_generic_name(self.base, self.arity())
    }
}

/// Parse `Base<A, B>` into its parts.
///
/// Returns `None` when the name is not a generic, or when the angle brackets
/// do not enclose the whole argument list.
#[must_use]
pub fn parse_generic(name: &str) -> Option<GenericName<'_>> {
    let name = name.trim();
    let open = name.find('<')?;
    if !name.ends_with('>') || open == 0 {
        return None;
    }
    let inner = &name[open + 1..name.len() - 1];

    // The opening bracket must be closed by the final character.
    let mut depth = 0usize;
    for c in inner.chars() {
        match c {
            '<' | '[' => depth += 1,
            '>' | ']' => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }

    let arguments = split_top_level(inner)
        .into_iter()
        .map(|arg| strip_brackets(arg.trim()))
        .collect();

    Some(GenericName {
        base: name[..open].trim_end(),
        arguments,
    })
}

fn strip_brackets(arg: &str) -> &str {
    if arg.len() >= 2 && arg.starts_with('[') && arg.ends_with(']') {
        let inner = &arg[1..arg.len() - 1];
        // `[]` alone or `Foo[]` are not wrappers.
        if !inner.is_empty() && balanced(inner) {
            return inner.trim();
        }
    }
    arg
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '<' | '[' => depth += 1,
            '>' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn top_level_comma(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, c) in text.char_indices() {
        match c {
            '<' | '[' => depth += 1,
            '>' | ']' => depth -= 1,
            ',' if depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(idx) = top_level_comma(rest) {
        parts.push(&rest[..idx]);
        rest = &rest[idx + 1..];
    }
    parts.push(rest);
    parts
}
