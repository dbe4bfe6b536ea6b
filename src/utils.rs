use glam::DVec2;
use yaml_rust::Yaml;

use crate::errors::ConfigError;

/// Read a number from the config, accepting both `1` and `1.0`.
pub fn yaml_f64(yaml: &Yaml) -> Option<f64> {
    match yaml {
        Yaml::Real(_) => yaml.as_f64(),
        Yaml::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

pub fn parse_dvec2(yaml: &Yaml, name: &str) -> Result<DVec2, ConfigError> {
    let illegal = || ConfigError::IllegalDVec2(format!("{name}: {yaml:?}"));
    let yaml_vec = yaml.as_vec().ok_or_else(illegal)?;
    match &yaml_vec[..] {
        [x, y] => Ok(DVec2 {
            x: yaml_f64(x).ok_or_else(illegal)?,
            y: yaml_f64(y).ok_or_else(illegal)?,
        }),
        _ => Err(illegal()),
    }
}

/// Read an optional number, `None` when the key is absent.
///
/// A key holding anything else than a number is an error, it never falls back to a default.
pub fn parse_optional_f64(yaml: &Yaml, name: &str) -> Result<Option<f64>, ConfigError> {
    if yaml.is_badvalue() {
        return Ok(None);
    }
    yaml_f64(yaml).map(Some).ok_or_else(|| {
        ConfigError::InvalidParameter(name.to_string(), format!("expected a number, got {yaml:?}"))
    })
}

/// Read an optional non-negative integer, `None` when the key is absent.
pub fn parse_optional_usize(yaml: &Yaml, name: &str) -> Result<Option<usize>, ConfigError> {
    match yaml {
        Yaml::BadValue => Ok(None),
        Yaml::Integer(n) if *n >= 0 => Ok(Some(*n as usize)),
        _ => Err(ConfigError::InvalidParameter(
            name.to_string(),
            format!("expected a non-negative integer, got {yaml:?}"),
        )),
    }
}

/// Like [`parse_dvec2`], but returns `None` when the key is absent.
pub fn parse_optional_dvec2(yaml: &Yaml, name: &str) -> Result<Option<DVec2>, ConfigError> {
    if yaml.is_badvalue() {
        Ok(None)
    } else {
        parse_dvec2(yaml, name).map(Some)
    }
}

#[cfg(test)]
mod test {
    use glam::DVec2;
    use yaml_rust::YamlLoader;

    use super::{
        parse_dvec2, parse_optional_dvec2, parse_optional_f64, parse_optional_usize, yaml_f64,
    };
    use crate::errors::ConfigError;

    #[test]
    fn test_parse_dvec2() {
        let cfg = &YamlLoader::load_from_str("a: [0., -1]\nb: [1., 2., 3.]\nc: 1").unwrap()[0];
        assert_eq!(parse_dvec2(&cfg["a"], "a").unwrap(), DVec2::new(0., -1.));
        assert!(parse_dvec2(&cfg["b"], "b").is_err());
        assert!(parse_dvec2(&cfg["c"], "c").is_err());
        assert_eq!(parse_optional_dvec2(&cfg["d"], "d").unwrap(), None);
        assert_eq!(yaml_f64(&cfg["c"]), Some(1.));
    }

    #[test]
    fn test_parse_optional_numbers() {
        let cfg = &YamlLoader::load_from_str("a: 1\nb: 2.5\nc: \"1\"\nd: -3\ne: [1.]").unwrap()[0];
        assert_eq!(parse_optional_f64(&cfg["a"], "a").unwrap(), Some(1.));
        assert_eq!(parse_optional_f64(&cfg["b"], "b").unwrap(), Some(2.5));
        assert_eq!(parse_optional_f64(&cfg["missing"], "missing").unwrap(), None);
        for key in ["c", "e"] {
            assert!(matches!(
                parse_optional_f64(&cfg[key], key),
                Err(ConfigError::InvalidParameter(..))
            ));
        }

        assert_eq!(parse_optional_usize(&cfg["a"], "a").unwrap(), Some(1));
        assert_eq!(parse_optional_usize(&cfg["missing"], "missing").unwrap(), None);
        for key in ["b", "c", "d"] {
            assert!(matches!(
                parse_optional_usize(&cfg[key], key),
                Err(ConfigError::InvalidParameter(..))
            ));
        }
    }
}
