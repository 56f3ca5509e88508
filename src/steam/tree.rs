//! Case-insensitive navigation helpers over a parsed VDF tree.
//!
//! Steam spells section names inconsistently across client versions
//! ("Steam" vs "steam"), so every lookup here compares keys without case.
//! Navigation into a missing section inserts an empty one under the
//! caller's spelling instead of failing; a lookup only errors when a
//! scalar occupies a slot where a section is expected.

use std::borrow::Cow;

use keyvalues_parser::{Key, Obj, Value};

use crate::steam::SteamError;

/// Stored spelling of `key`, compared case-insensitively.
pub fn find_key<'text>(obj: &Obj<'text>, key: &str) -> Option<Key<'text>> {
    obj.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned()
}

/// Find-or-insert a nested section. Repeated calls with any casing of the
/// same key return the same section and never create a duplicate.
pub fn ensure_section<'a, 'text>(
    obj: &'a mut Obj<'text>,
    key: &str,
) -> Result<&'a mut Obj<'text>, SteamError> {
    let spelling = match find_key(obj, key) {
        Some(spelling) => spelling,
        None => {
            let owned: Key<'text> = Cow::Owned(key.to_owned());
            obj.insert(owned.clone(), vec![Value::Obj(Obj::new())]);
            owned
        }
    };
    let values = obj
        .get_mut(spelling.as_ref())
        .ok_or_else(|| SteamError::Structure { key: key.to_owned() })?;
    if values.is_empty() {
        values.push(Value::Obj(Obj::new()));
    }
    match values.first_mut() {
        Some(Value::Obj(section)) => Ok(section),
        _ => Err(SteamError::Structure { key: key.to_owned() }),
    }
}

/// Walk a fixed path of section names, vivifying missing intermediates.
pub fn ensure_path<'a, 'text>(
    root: &'a mut Obj<'text>,
    path: &[&str],
) -> Result<&'a mut Obj<'text>, SteamError> {
    let mut node = root;
    for key in path {
        node = ensure_section(node, key)?;
    }
    Ok(node)
}

/// Read-only section lookup; never vivifies.
pub fn get_section<'a, 'text>(obj: &'a Obj<'text>, key: &str) -> Option<&'a Obj<'text>> {
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .and_then(|value| match value {
            Value::Obj(section) => Some(section),
            Value::Str(_) => None,
        })
}

/// Read-only walk of a fixed path of section names.
pub fn get_path<'a, 'text>(root: &'a Obj<'text>, path: &[&str]) -> Option<&'a Obj<'text>> {
    let mut node = root;
    for key in path {
        node = get_section(node, key)?;
    }
    Some(node)
}

pub fn get_str<'a>(obj: &'a Obj<'_>, key: &str) -> Option<&'a str> {
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .and_then(|value| match value {
            Value::Str(s) => Some(s.as_ref()),
            Value::Obj(_) => None,
        })
}

/// Set a scalar, preserving the spelling of an existing key.
pub fn set_str(obj: &mut Obj<'_>, key: &str, value: &str) {
    let spelling = find_key(obj, key).unwrap_or_else(|| Cow::Owned(key.to_owned()));
    obj.insert(spelling, vec![Value::Str(Cow::Owned(value.to_owned()))]);
}

/// Remove `key` under any casing. Returns whether an entry was removed.
pub fn remove_key(obj: &mut Obj<'_>, key: &str) -> bool {
    match find_key(obj, key) {
        Some(spelling) => obj.remove(spelling.as_ref()).is_some(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use keyvalues_parser::Vdf;

    use super::*;

    const REGISTRY: &str = r#""Registry"
{
	"HKCU"
	{
		"Software"
		{
			"Valve"
			{
				"steam"
				{
					"AutoLoginUser"		"bob"
					"RememberPassword"		"1"
				}
			}
		}
	}
}
"#;

    fn root_obj<'a, 'text>(vdf: &'a mut Vdf<'text>) -> Result<&'a mut Obj<'text>> {
        match &mut vdf.value {
            Value::Obj(obj) => Ok(obj),
            Value::Str(_) => anyhow::bail!("fixture root is not a section"),
        }
    }

    #[test]
    fn ensure_section_is_case_insensitive_and_idempotent() -> Result<()> {
        let mut vdf = Vdf::parse(REGISTRY)?;
        let root = root_obj(&mut vdf)?;
        {
            let steam = ensure_path(root, &["HKCU", "Software", "Valve", "Steam"])?;
            assert_eq!(get_str(steam, "AutoLoginUser"), Some("bob"));
        }
        // Second walk with different casing must land on the same node
        // without duplicating any key along the way.
        let valve = ensure_path(root, &["hkcu", "SOFTWARE", "valve"])?;
        let spellings: Vec<_> = valve
            .keys()
            .filter(|k| k.eq_ignore_ascii_case("steam"))
            .collect();
        assert_eq!(spellings, vec!["steam"]);
        Ok(())
    }

    #[test]
    fn ensure_section_vivifies_missing_sections() -> Result<()> {
        let mut vdf = Vdf::parse("\"Registry\"\n{\n}\n")?;
        let root = root_obj(&mut vdf)?;
        let steam = ensure_path(root, &["HKCU", "Software", "Valve", "Steam"])?;
        set_str(steam, "AutoLoginUser", "alice");
        let rendered = vdf.to_string();
        let reparsed = Vdf::parse(&rendered)?;
        assert_eq!(reparsed, vdf);
        Ok(())
    }

    #[test]
    fn ensure_section_rejects_scalar_in_the_way() -> Result<()> {
        let mut vdf = Vdf::parse("\"Registry\"\n{\n\t\"HKCU\"\t\t\"oops\"\n}\n")?;
        let root = root_obj(&mut vdf)?;
        assert!(matches!(
            ensure_section(root, "HKCU"),
            Err(SteamError::Structure { .. })
        ));
        Ok(())
    }

    #[test]
    fn set_str_keeps_existing_spelling() -> Result<()> {
        let mut vdf = Vdf::parse(REGISTRY)?;
        let root = root_obj(&mut vdf)?;
        let steam = ensure_path(root, &["HKCU", "Software", "Valve", "Steam"])?;
        set_str(steam, "autologinuser", "alice");
        assert_eq!(find_key(steam, "AutoLoginUser").as_deref(), Some("AutoLoginUser"));
        assert_eq!(get_str(steam, "AutoLoginUser"), Some("alice"));
        Ok(())
    }

    #[test]
    fn remove_key_matches_any_casing() -> Result<()> {
        let mut vdf = Vdf::parse(REGISTRY)?;
        let root = root_obj(&mut vdf)?;
        let steam = ensure_path(root, &["HKCU", "Software", "Valve", "Steam"])?;
        assert!(remove_key(steam, "REMEMBERPASSWORD"));
        assert!(!remove_key(steam, "RememberPassword"));
        assert_eq!(get_str(steam, "RememberPassword"), None);
        Ok(())
    }

    #[test]
    fn rendering_round_trips() -> Result<()> {
        let vdf = Vdf::parse(REGISTRY)?;
        let rendered = vdf.to_string();
        let reparsed = Vdf::parse(&rendered)?;
        assert_eq!(reparsed, vdf);
        // A second render is a fixpoint of the format.
        assert_eq!(reparsed.to_string(), rendered);
        Ok(())
    }
}
