//! Projects every ensemble member onto the common grid.

use std::collections::BTreeMap;

use ndarray::{Array3, ArrayD, Axis};

use crate::catalog::member::ClimatologyKey;
use crate::dataset::Dataset;

use super::conservative::remap;
use super::{cell_areas, Grid, RegridError, AREACELLA};

/// Regrids `variables` of every member onto `common`, then attaches the
/// common grid's cell-area field to each output record as `areacella`,
/// replacing whatever native-grid area field a member carried.
///
/// The first variable initializes each member's output record; every
/// subsequent variable is folded in. A member lacking one of the requested
/// variables fails the whole call with [`RegridError::MissingVariable`]; no
/// partial record is emitted.
pub fn regrid_ensemble(
    members: &BTreeMap<ClimatologyKey, Dataset>,
    variables: &[String],
    common: &Grid,
) -> Result<BTreeMap<ClimatologyKey, Dataset>, RegridError> {
    if members.is_empty() || variables.is_empty() {
        return Err(RegridError::EmptyEnsemble);
    }

    let mut regridded: BTreeMap<ClimatologyKey, Dataset> = BTreeMap::new();

    // first variable initializes the output records
    let first = &variables[0];
    for (key, member) in members {
        let mut record = Dataset::new(common.lat.clone(), common.lon.clone());
        let field = regrid_variable(key, member, first, common)?;
        record
            .add_variable(first, field)
            .expect("regridded field matches the common grid by construction");
        regridded.insert(key.clone(), record);
    }

    // fold in the remaining variables
    for variable in &variables[1..] {
        for (key, member) in members {
            let field = regrid_variable(key, member, variable, common)?;
            let record = regridded
                .get_mut(key)
                .expect("record initialized with the first variable");
            record
                .add_variable(variable, field)
                .expect("regridded field matches the common grid by construction");
        }
    }

    // one shared area field for every record
    let areas = cell_areas(common)?;
    let areas = areas.into_dyn();
    for record in regridded.values_mut() {
        record
            .add_variable(AREACELLA, areas.clone())
            .expect("area field matches the common grid by construction");
    }

    Ok(regridded)
}

fn regrid_variable(
    key: &ClimatologyKey,
    member: &Dataset,
    variable: &str,
    common: &Grid,
) -> Result<ArrayD<f64>, RegridError> {
    let field = member
        .variable(variable)
        .ok_or_else(|| RegridError::MissingVariable {
            key: key.to_string(),
            variable: variable.to_string(),
        })?;
    let src = member.grid();

    match field.ndim() {
        2 => {
            let map = field
                .view()
                .into_dimensionality::<ndarray::Ix2>()
                .expect("rank checked");
            Ok(remap(map, &src, common)?.into_dyn())
        }
        3 => {
            let cube = field
                .view()
                .into_dimensionality::<ndarray::Ix3>()
                .expect("rank checked");
            let n_months = cube.len_of(Axis(0));
            let mut out = Array3::zeros((n_months, common.lat.len(), common.lon.len()));
            for month in 0..n_months {
                let slice = remap(cube.index_axis(Axis(0), month), &src, common)?;
                out.index_axis_mut(Axis(0), month).assign(&slice);
            }
            Ok(out.into_dyn())
        }
        ndim => {
            // Dataset::add_variable only admits ranks 2 and 3
            let shape = field.shape();
            Err(RegridError::ShapeMismatch {
                rows: if ndim > 0 { shape[0] } else { 0 },
                cols: if ndim > 1 { shape[1] } else { 0 },
                n_lat: src.lat.len(),
                n_lon: src.lon.len(),
            })
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regrid::common_coarse_grid;
    use approx::assert_abs_diff_eq;
    use ndarray::ArrayD;

    fn regular_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    fn member(lat_step: f64, lon_step: f64, value: f64) -> Dataset {
        let n_lat = (180.0 / lat_step).round() as usize;
        let n_lon = (360.0 / lon_step).round() as usize;
        let mut ds = Dataset::new(
            regular_axis(-90.0 + lat_step / 2.0, lat_step, n_lat),
            regular_axis(0.0, lon_step, n_lon),
        );
        ds.add_variable("rsdt", ArrayD::from_elem(vec![12, n_lat, n_lon], value))
            .unwrap();
        ds
    }

    fn key(name: &str) -> ClimatologyKey {
        format!("{name}.r1i1p1f1.piClim-control").parse().unwrap()
    }

    #[test]
    fn should_regrid_two_members_onto_shared_grid() {
        let mut members = BTreeMap::new();
        members.insert(key("FINE"), member(2.0, 2.0, 1.0));
        members.insert(key("COARSE"), member(3.0, 3.0, 2.0));

        let grids: Vec<_> = members.values().map(Dataset::grid).collect();
        let common = common_coarse_grid(grids.iter()).unwrap();
        // coarsest native lon step is 3° and 360 % 3 == 0
        assert_abs_diff_eq!(common.lon[1] - common.lon[0], 3.0);

        let out = regrid_ensemble(&members, &["rsdt".to_string()], &common).unwrap();
        assert_eq!(out.len(), 2);

        let fine = &out[&key("FINE")];
        let coarse = &out[&key("COARSE")];
        assert_eq!(fine.lat(), coarse.lat());
        assert_eq!(fine.lon(), coarse.lon());

        // constant fields survive the projection
        for v in fine.variable("rsdt").unwrap().iter() {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-9);
        }

        // both carry the identical shared area field
        let a = fine.variable(AREACELLA).unwrap();
        let b = coarse.variable(AREACELLA).unwrap();
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y);
        }
    }

    #[test]
    fn should_overwrite_native_area_field() {
        let mut ds = member(30.0, 30.0, 1.0);
        let (n_lat, n_lon) = ds.grid().shape();
        ds.add_variable(AREACELLA, ArrayD::from_elem(vec![n_lat, n_lon], -1.0))
            .unwrap();

        let mut members = BTreeMap::new();
        members.insert(key("ONE"), ds);

        let grids: Vec<_> = members.values().map(Dataset::grid).collect();
        let common = common_coarse_grid(grids.iter()).unwrap();
        let out = regrid_ensemble(&members, &["rsdt".to_string()], &common).unwrap();

        let areas = out[&key("ONE")].variable(AREACELLA).unwrap();
        assert!(areas.iter().all(|v| *v > 0.0), "native placeholder must be replaced");
    }

    #[test]
    fn should_fail_naming_member_and_missing_variable() {
        let mut full = member(3.0, 3.0, 1.0);
        let (n_lat, n_lon) = full.grid().shape();
        full.add_variable("rsut", ArrayD::from_elem(vec![12, n_lat, n_lon], 2.0))
            .unwrap();

        let mut members = BTreeMap::new();
        members.insert(key("FULL"), full);
        members.insert(key("GAPPY"), member(3.0, 3.0, 1.0));

        let grids: Vec<_> = members.values().map(Dataset::grid).collect();
        let common = common_coarse_grid(grids.iter()).unwrap();

        let err = regrid_ensemble(
            &members,
            &["rsdt".to_string(), "rsut".to_string()],
            &common,
        )
        .unwrap_err();

        match err {
            RegridError::MissingVariable { key: k, variable } => {
                assert_eq!(k, "GAPPY.r1i1p1f1.piClim-control");
                assert_eq!(variable, "rsut");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
