use crate::TileSpec;

/// Token that expands to the default spec list.
pub const DEFAULT_SENTINEL: &str = "default";

/// Splits a comma-separated list into trimmed, non-empty tokens.
pub fn split_specs(list: &str) -> impl Iterator<Item = &str> {
	list.split(',').map(str::trim).filter(|token| !token.is_empty())
}

/// Parses a raw spec list against the default list.
///
/// The first [`DEFAULT_SENTINEL`] token expands in place to `defaults`; later
/// sentinels are dropped. Every default spec missing from the result is then
/// appended in `defaults` order, so a misspelled or omitted default still
/// shows up. The result holds each spec once, at its first position.
pub fn parse_spec_list(raw: &str, defaults: &str) -> Vec<TileSpec> {
	fn push(token: &str, specs: &mut Vec<TileSpec>) {
		if !specs.iter().any(|spec| spec == token) {
			specs.push(TileSpec::new(token));
		}
	}

	let mut specs = Vec::new();
	let mut expanded_default = false;
	for token in split_specs(raw) {
		if token == DEFAULT_SENTINEL {
			if !expanded_default {
				expanded_default = true;
				for default in split_specs(defaults) {
					push(default, &mut specs);
				}
			}
			continue;
		}
		push(token, &mut specs);
	}

	for default in split_specs(defaults) {
		push(default, &mut specs);
	}

	specs
}
