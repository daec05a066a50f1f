//! Parameter Sets

use crate::error::*;
use crate::geometry::*;
use crate::pbrt::*;
use crate::spectrum::*;
use std::collections::HashMap;
use std::fmt;

mod paramset_item;

// Re-export
pub use paramset_item::*;

/// A hashmap of parameter set items stored by name.
pub type ParamSetMap<T> = HashMap<String, ParamSetItem<T>>;

/// Stores parameter set items of different types in hashmaps.
#[derive(Clone, Default)]
pub struct ParamSet {
    pub bools: ParamSetMap<bool>,
    pub ints: ParamSetMap<Int>,
    pub floats: ParamSetMap<Float>,
    pub point3fs: ParamSetMap<Point3f>,
    pub spectra: ParamSetMap<SpectrumF>,
    pub strings: ParamSetMap<String>,
}

/// Define a macro that can be used to generate a function for adding/replacing
/// parameter set item.
macro_rules! paramset_add {
    ($func: ident, $t: ty, $paramset: ident) => {
        pub fn $func(&mut self, name: &str, values: &[$t]) {
            let n = String::from(name);
            self.$paramset.insert(n, ParamSetItem::new(values.to_vec()));
        }
    };
}

/// Define a macro that can be used to generate a function for finding
/// parameter set item that is stored as a single item.
macro_rules! paramset_find_one {
    ($func: ident, $t: ty, $paramset: ident) => {
        pub fn $func(&self, name: &str, default: $t) -> $t {
            match self.$paramset.get(name) {
                Some(param) => {
                    param.looked_up.set(true);
                    if param.values.len() == 1 {
                        param.values[0].clone()
                    } else {
                        default.clone()
                    }
                }
                None => default.clone(),
            }
        }
    };
}

/// Define a macro that can be used to generate a function for finding
/// parameter set item that is stored as a list.
macro_rules! paramset_find {
    ($func: ident, $t: ty, $paramset: ident) => {
        pub fn $func(&self, name: &str) -> Vec<$t> {
            match self.$paramset.get(name) {
                Some(param) => {
                    param.looked_up.set(true);
                    param.values.clone()
                }
                None => vec![],
            }
        }
    };
}

impl ParamSet {
    /// Returns a new `ParamSet`.
    pub fn new() -> Self {
        Self::default()
    }

    paramset_add!(add_bool, bool, bools);
    paramset_add!(add_int, Int, ints);
    paramset_add!(add_float, Float, floats);
    paramset_add!(add_point3f, Point3f, point3fs);
    paramset_add!(add_rgb_spectrum, SpectrumF, spectra);
    paramset_add!(add_string, String, strings);

    paramset_find_one!(find_one_bool, bool, bools);
    paramset_find_one!(find_one_int, Int, ints);
    paramset_find_one!(find_one_float, Float, floats);
    paramset_find_one!(find_one_point3f, Point3f, point3fs);
    paramset_find_one!(find_one_spectrum, SpectrumF, spectra);
    paramset_find_one!(find_one_string, String, strings);

    paramset_find!(find_float, Float, floats);
    paramset_find!(find_int, Int, ints);

    /// Parses a `name=value` assignment and stores it. Values are typed by
    /// their shape: `true`/`false` become booleans, integers become ints,
    /// numbers become floats, three comma separated numbers become a point
    /// and an RGB spectrum, anything else a string.
    ///
    /// * `assignment` - The assignment text.
    pub fn add_assignment(&mut self, assignment: &str) -> Result<()> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| Error::Config(assignment.to_string(), "expected name=value".to_string()))?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            return Err(Error::Config(assignment.to_string(), "empty parameter name".to_string()));
        }

        if let Ok(b) = value.parse::<bool>() {
            self.add_bool(name, &[b]);
        } else if let Ok(i) = value.parse::<Int>() {
            self.add_int(name, &[i]);
            self.add_float(name, &[i as Float]);
        } else if let Ok(f) = value.parse::<Float>() {
            self.add_float(name, &[f]);
        } else {
            let parts: Vec<Float> = value.split(',').filter_map(|v| v.trim().parse::<Float>().ok()).collect();
            if parts.len() == 3 && value.split(',').count() == 3 {
                self.add_point3f(name, &[Point3f::new(parts[0], parts[1], parts[2])]);
                self.add_rgb_spectrum(name, &[SpectrumF::new(parts[0], parts[1], parts[2])]);
            } else {
                self.add_string(name, &[value.to_string()]);
            }
        }
        Ok(())
    }

    /// Returns names of parameters that were never looked up.
    pub fn unused(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        let mut used: Vec<String> = Vec::new();
        macro_rules! collect {
            ($($map: ident),*) => {
                $(
                    for (name, item) in self.$map.iter() {
                        all.push(name.clone());
                        if item.looked_up.get() {
                            used.push(name.clone());
                        }
                    }
                )*
            };
        }
        collect!(bools, ints, floats, point3fs, spectra, strings);
        all.retain(|name| !used.contains(name));
        all.sort();
        all.dedup();
        all
    }

    /// Logs a warning for every parameter that was never looked up.
    pub fn report_unused(&self) {
        for name in self.unused() {
            warn!("Parameter '{}' unused", name);
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, p) in self.bools.iter() {
            writeln!(f, "\"bool {}\" {:?}", name, p.values)?;
        }
        for (name, p) in self.ints.iter() {
            writeln!(f, "\"integer {}\" {:?}", name, p.values)?;
        }
        for (name, p) in self.floats.iter() {
            writeln!(f, "\"float {}\" {:?}", name, p.values)?;
        }
        for (name, p) in self.strings.iter() {
            writeln!(f, "\"string {}\" {:?}", name, p.values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_are_typed() {
        let mut ps = ParamSet::new();
        ps.add_assignment("max_depth=3").unwrap();
        ps.add_assignment("clamp_mass_thres=1e-6").unwrap();
        ps.add_assignment("hide_emitters=true").unwrap();
        ps.add_assignment("guiding=octree").unwrap();
        ps.add_assignment("radiance=1,2,3").unwrap();
        assert_eq!(ps.find_one_int("max_depth", 6), 3);
        assert_eq!(ps.find_one_float("max_depth", 6.0), 3.0);
        assert_eq!(ps.find_one_float("clamp_mass_thres", 0.0), 1e-6);
        assert!(ps.find_one_bool("hide_emitters", false));
        assert_eq!(ps.find_one_string("guiding", String::new()), "octree");
        assert_eq!(ps.find_one_spectrum("radiance", SpectrumF::zero())[2], 3.0);
    }

    #[test]
    fn malformed_assignment_is_rejected() {
        let mut ps = ParamSet::new();
        assert!(ps.add_assignment("max_depth").is_err());
        assert!(ps.add_assignment("=3").is_err());
    }

    #[test]
    fn unused_parameters_are_reported() {
        let mut ps = ParamSet::new();
        ps.add_int("max_depth", &[2]);
        ps.add_int("typo_depth", &[2]);
        let _ = ps.find_one_int("max_depth", 6);
        assert_eq!(ps.unused(), vec!["typo_depth".to_string()]);
    }
}
