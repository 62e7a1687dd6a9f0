//! Reference data: grid regions, zip codes, vehicles and transit types.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::emissions::average_factor;
use crate::error::{Error, Result};
use crate::model::{normalize_zipcode, CarSpec, RegistryCar, Region, TransitType, Zipcode};

use super::Storage;

/// A batch of registry rows, as read from a JSON import file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryImport {
    /// Grid regions.
    pub regions: Vec<Region>,
    /// Zip codes; their regions must be in this batch or already stored.
    pub zipcodes: Vec<Zipcode>,
    /// Vehicle registry rows.
    pub cars: Vec<RegistryCar>,
    /// Transit types.
    pub transit_types: Vec<TransitType>,
}

/// Rows written by [`Storage::import_registry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Regions inserted or updated.
    pub regions: usize,
    /// Zip codes inserted or updated.
    pub zipcodes: usize,
    /// Registry cars inserted.
    pub cars: usize,
    /// Transit types inserted or updated.
    pub transit_types: usize,
}

impl Storage {
    /// Insert a grid region, or update its factor if the name exists.
    ///
    /// Returns the region id.
    ///
    /// # Errors
    ///
    /// Returns an error if the factor is not positive or the database operation fails.
    pub fn add_region(&self, region: &Region) -> Result<i64> {
        if !region.lb_co2e_per_mwh.is_finite() || region.lb_co2e_per_mwh < 0.0 {
            return Err(Error::invalid_input(format!(
                "region {} has invalid factor {}",
                region.name, region.lb_co2e_per_mwh
            )));
        }

        self.conn.execute(
            r"
            INSERT INTO regions (name, lb_co2e_per_mwh) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET lb_co2e_per_mwh = excluded.lb_co2e_per_mwh
            ",
            params![region.name, region.lb_co2e_per_mwh],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM regions WHERE name = ?1",
            [&region.name],
            |row| row.get(0),
        )?;
        debug!("Stored region {} with id {}", region.name, id);
        Ok(id)
    }

    /// Get a region by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn region(&self, name: &str) -> Result<Option<Region>> {
        let region = self
            .conn
            .query_row(
                "SELECT id, name, lb_co2e_per_mwh FROM regions WHERE name = ?1",
                [name],
                |row| {
                    Ok(Region {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        lb_co2e_per_mwh: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(region)
    }

    /// Map a zip code to a stored region, replacing any previous mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the zip code is malformed, the region is unknown,
    /// or the database operation fails.
    pub fn add_zipcode(&self, zipcode: &Zipcode) -> Result<()> {
        let code = normalize_zipcode(&zipcode.zipcode)?;
        let region = self
            .region(&zipcode.region)?
            .ok_or_else(|| Error::not_found("region", &zipcode.region))?;

        self.conn.execute(
            r"
            INSERT OR REPLACE INTO zipcodes (zipcode, region_id, city, state)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                code,
                region.id,
                zipcode.city,
                zipcode.state.as_deref().map(str::to_uppercase),
            ],
        )?;
        Ok(())
    }

    /// Get the grid region serving a zip code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the zip code is not in the registry.
    pub fn region_for_zipcode(&self, zipcode: &str) -> Result<Region> {
        let code = normalize_zipcode(zipcode)?;
        self.conn
            .query_row(
                r"
                SELECT r.id, r.name, r.lb_co2e_per_mwh
                FROM zipcodes z JOIN regions r ON r.id = z.region_id
                WHERE z.zipcode = ?1
                ",
                [&code],
                |row| {
                    Ok(Region {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        lb_co2e_per_mwh: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| Error::not_found("zipcode", code))
    }

    /// Find a zip code for a city and state.
    ///
    /// Matching ignores case. When several zip codes share a city the lowest
    /// one is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn lookup_zipcode(&self, city: &str, state: &str) -> Result<Option<String>> {
        let zipcode = self
            .conn
            .query_row(
                r"
                SELECT zipcode FROM zipcodes
                WHERE city = ?1 COLLATE NOCASE AND state = ?2 COLLATE NOCASE
                ORDER BY zipcode LIMIT 1
                ",
                params![city.trim(), state.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(zipcode)
    }

    /// Insert a vehicle registry row, or replace the figures of the row for
    /// the same make, model, year, cylinders and transmission.
    ///
    /// Returns the row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the factor is negative or not finite, or the
    /// database operation fails.
    pub fn add_registry_car(&self, car: &RegistryCar) -> Result<i64> {
        if let Some(factor) = car.grams_co2_per_mile {
            if !factor.is_finite() || factor < 0.0 {
                return Err(Error::invalid_input(format!(
                    "car {} {} {} has invalid factor {factor}",
                    car.year, car.make, car.model
                )));
            }
        }

        let existing: Option<i64> = self
            .conn
            .query_row(
                r"
                SELECT id FROM cars
                WHERE make = ?1 AND model = ?2 AND year = ?3
                  AND cylinders IS ?4 AND transmission IS ?5
                ",
                params![car.make, car.model, car.year, car.cylinders, car.transmission],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            self.conn.execute(
                r"
                UPDATE cars SET fuel_type = ?1, grams_co2_per_mile = ?2,
                                mpg_city = ?3, mpg_highway = ?4, mpg_combined = ?5
                WHERE id = ?6
                ",
                params![
                    car.fuel_type,
                    car.grams_co2_per_mile,
                    car.mpg_city,
                    car.mpg_highway,
                    car.mpg_combined,
                    id,
                ],
            )?;
            debug!("Updated registry car {}", id);
            return Ok(id);
        }

        self.conn.execute(
            r"
            INSERT INTO cars (make, model, year, cylinders, transmission, fuel_type,
                              grams_co2_per_mile, mpg_city, mpg_highway, mpg_combined)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                car.make,
                car.model,
                car.year,
                car.cylinders,
                car.transmission,
                car.fuel_type,
                car.grams_co2_per_mile,
                car.mpg_city,
                car.mpg_highway,
                car.mpg_combined,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get every registry row matching a car spec.
    ///
    /// Make and model match case-insensitively; cylinders and transmission
    /// only constrain the match when the spec sets them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn matching_cars(&self, spec: &CarSpec) -> Result<Vec<RegistryCar>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, make, model, year, cylinders, transmission, fuel_type,
                   grams_co2_per_mile, mpg_city, mpg_highway, mpg_combined
            FROM cars
            WHERE make = ?1 COLLATE NOCASE
              AND model = ?2 COLLATE NOCASE
              AND year = ?3
              AND (?4 IS NULL OR cylinders = ?4)
              AND (?5 IS NULL OR transmission = ?5 COLLATE NOCASE)
            ORDER BY id
            ",
        )?;

        let cars = stmt
            .query_map(
                params![
                    spec.make,
                    spec.model,
                    spec.year,
                    spec.cylinders,
                    spec.transmission
                ],
                Self::row_to_registry_car,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("{} registry rows match {}", cars.len(), spec);
        Ok(cars)
    }

    /// Average grams of CO2 per mile over the registry rows matching a spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatchingCar`] if no matching row has a factor.
    pub fn car_factor(&self, spec: &CarSpec) -> Result<f64> {
        let cars = self.matching_cars(spec)?;
        average_factor(&cars).ok_or_else(|| Error::NoMatchingCar {
            spec: spec.to_string(),
        })
    }

    /// Insert a transit type, or update its factor if the name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the factor is negative or not finite, or the
    /// database operation fails.
    pub fn add_transit_type(&self, transit: &TransitType) -> Result<i64> {
        if !transit.grams_co2_per_mile.is_finite() || transit.grams_co2_per_mile < 0.0 {
            return Err(Error::invalid_input(format!(
                "transit type {} has invalid factor {}",
                transit.name, transit.grams_co2_per_mile
            )));
        }

        self.conn.execute(
            r"
            INSERT INTO transit_types (name, grams_co2_per_mile) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET grams_co2_per_mile = excluded.grams_co2_per_mile
            ",
            params![transit.name, transit.grams_co2_per_mile],
        )?;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM transit_types WHERE name = ?1",
            [&transit.name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// List transit types by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn transit_types(&self) -> Result<Vec<TransitType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, grams_co2_per_mile FROM transit_types ORDER BY name")?;
        let types = stmt
            .query_map([], |row| {
                Ok(TransitType {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    grams_co2_per_mile: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(types)
    }

    /// Get a transit type by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn transit_type(&self, name: &str) -> Result<Option<TransitType>> {
        let transit = self
            .conn
            .query_row(
                r"
                SELECT id, name, grams_co2_per_mile FROM transit_types
                WHERE name = ?1 COLLATE NOCASE
                ",
                [name],
                |row| {
                    Ok(TransitType {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        grams_co2_per_mile: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(transit)
    }

    /// Import a registry batch in a single transaction.
    ///
    /// Regions are written first so zip codes in the same batch can refer to
    /// them.
    ///
    /// # Errors
    ///
    /// Returns an error, and writes nothing, if any row is rejected.
    pub fn import_registry(&self, batch: &RegistryImport) -> Result<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;

        for region in &batch.regions {
            self.add_region(region)?;
        }
        for zipcode in &batch.zipcodes {
            self.add_zipcode(zipcode)?;
        }
        for car in &batch.cars {
            self.add_registry_car(car)?;
        }
        for transit in &batch.transit_types {
            self.add_transit_type(transit)?;
        }

        tx.commit()?;

        let summary = ImportSummary {
            regions: batch.regions.len(),
            zipcodes: batch.zipcodes.len(),
            cars: batch.cars.len(),
            transit_types: batch.transit_types.len(),
        };
        info!(
            "Imported {} regions, {} zip codes, {} cars, {} transit types",
            summary.regions, summary.zipcodes, summary.cars, summary.transit_types
        );
        Ok(summary)
    }

    fn row_to_registry_car(row: &rusqlite::Row) -> rusqlite::Result<RegistryCar> {
        Ok(RegistryCar {
            id: Some(row.get(0)?),
            make: row.get(1)?,
            model: row.get(2)?,
            year: row.get(3)?,
            cylinders: row.get(4)?,
            transmission: row.get(5)?,
            fuel_type: row.get(6)?,
            grams_co2_per_mile: row.get(7)?,
            mpg_city: row.get(8)?,
            mpg_highway: row.get(9)?,
            mpg_combined: row.get(10)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn registry_car(
        make: &str,
        model: &str,
        year: i32,
        cylinders: Option<i32>,
        transmission: Option<&str>,
        factor: Option<f64>,
    ) -> RegistryCar {
        RegistryCar {
            id: None,
            make: make.to_string(),
            model: model.to_string(),
            year,
            cylinders,
            transmission: transmission.map(str::to_string),
            fuel_type: Some("Regular Gasoline".to_string()),
            grams_co2_per_mile: factor,
            mpg_city: None,
            mpg_highway: None,
            mpg_combined: None,
        }
    }

    /// Two regions, three zip codes, a handful of cars and one transit type.
    pub(crate) fn seed_registry(storage: &Storage) {
        let batch = RegistryImport {
            regions: vec![
                Region {
                    id: None,
                    name: "CAMX".to_string(),
                    lb_co2e_per_mwh: 500.0,
                },
                Region {
                    id: None,
                    name: "RMPA".to_string(),
                    lb_co2e_per_mwh: 1800.0,
                },
            ],
            zipcodes: vec![
                Zipcode {
                    zipcode: "94110".to_string(),
                    region: "CAMX".to_string(),
                    city: Some("San Francisco".to_string()),
                    state: Some("CA".to_string()),
                },
                Zipcode {
                    zipcode: "94103".to_string(),
                    region: "CAMX".to_string(),
                    city: Some("San Francisco".to_string()),
                    state: Some("CA".to_string()),
                },
                Zipcode {
                    zipcode: "80202".to_string(),
                    region: "RMPA".to_string(),
                    city: Some("Denver".to_string()),
                    state: Some("co".to_string()),
                },
            ],
            cars: vec![
                registry_car("Toyota", "Prius", 2012, Some(4), Some("Automatic (variable gear ratios)"), Some(180.0)),
                registry_car("Honda", "Civic", 2015, Some(4), Some("Manual (M6)"), Some(300.0)),
                registry_car("Honda", "Civic", 2015, Some(4), Some("Automatic (AV)"), Some(280.0)),
                registry_car("Honda", "Civic", 2015, Some(6), Some("Automatic (S5)"), None),
                registry_car("Ford", "F150", 2010, Some(8), Some("Automatic (S6)"), Some(700.0)),
            ],
            transit_types: vec![TransitType {
                id: None,
                name: "bus".to_string(),
                grams_co2_per_mile: 290.0,
            }],
        };
        storage.import_registry(&batch).unwrap();
    }

    fn create_test_storage() -> Storage {
        let storage = Storage::open_in_memory().expect("failed to create test storage");
        seed_registry(&storage);
        storage
    }

    #[test]
    fn test_import_counts() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.regions, 2);
        assert_eq!(stats.zipcodes, 3);
        assert_eq!(stats.registry_cars, 5);
        assert_eq!(stats.transit_types, 1);
    }

    #[test]
    fn test_add_region_upserts() {
        let storage = create_test_storage();
        let id = storage
            .add_region(&Region {
                id: None,
                name: "CAMX".to_string(),
                lb_co2e_per_mwh: 600.0,
            })
            .unwrap();

        let region = storage.region("CAMX").unwrap().unwrap();
        assert_eq!(region.id, Some(id));
        assert!((region.lb_co2e_per_mwh - 600.0).abs() < f64::EPSILON);
        assert_eq!(storage.stats().unwrap().regions, 2);
    }

    #[test]
    fn test_add_region_rejects_negative_factor() {
        let storage = create_test_storage();
        let result = storage.add_region(&Region {
            id: None,
            name: "BAD".to_string(),
            lb_co2e_per_mwh: -1.0,
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_reimport_updates_cars_in_place() {
        let storage = create_test_storage();
        let prius_id = storage.matching_cars(&CarSpec::new("Toyota", "Prius", 2012)).unwrap()[0]
            .id;

        let batch = RegistryImport {
            cars: vec![registry_car(
                "Toyota",
                "Prius",
                2012,
                Some(4),
                Some("Automatic (variable gear ratios)"),
                Some(178.0),
            )],
            ..RegistryImport::default()
        };
        storage.import_registry(&batch).unwrap();
        seed_registry(&storage);
        storage.import_registry(&batch).unwrap();

        assert_eq!(storage.stats().unwrap().registry_cars, 5);
        let prius = storage.matching_cars(&CarSpec::new("Toyota", "Prius", 2012)).unwrap();
        assert_eq!(prius.len(), 1);
        assert_eq!(prius[0].id, prius_id);
        assert_eq!(prius[0].grams_co2_per_mile, Some(178.0));
    }

    #[test]
    fn test_add_registry_car_keeps_variants_apart() {
        let storage = create_test_storage();
        storage
            .add_registry_car(&registry_car("Toyota", "Prius", 2012, None, None, Some(190.0)))
            .unwrap();
        assert_eq!(storage.stats().unwrap().registry_cars, 6);
    }

    #[test]
    fn test_add_registry_car_rejects_invalid_factor() {
        let storage = create_test_storage();
        for factor in [-5.0, f64::NAN, f64::INFINITY] {
            let result = storage.add_registry_car(&registry_car(
                "Kia", "Soul", 2014, None, None, Some(factor),
            ));
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn test_add_transit_type_rejects_invalid_factor() {
        let storage = create_test_storage();
        for factor in [-1.0, f64::NAN] {
            let result = storage.add_transit_type(&TransitType {
                id: None,
                name: "ferry".to_string(),
                grams_co2_per_mile: factor,
            });
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
        assert!(storage.transit_type("ferry").unwrap().is_none());
    }

    #[test]
    fn test_region_for_zipcode() {
        let storage = create_test_storage();
        let region = storage.region_for_zipcode("80202").unwrap();
        assert_eq!(region.name, "RMPA");
    }

    #[test]
    fn test_region_for_unknown_zipcode() {
        let storage = create_test_storage();
        let err = storage.region_for_zipcode("10001").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_add_zipcode_unknown_region() {
        let storage = create_test_storage();
        let err = storage
            .add_zipcode(&Zipcode {
                zipcode: "10001".to_string(),
                region: "NYCW".to_string(),
                city: None,
                state: None,
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_add_zipcode_rejects_malformed() {
        let storage = create_test_storage();
        let result = storage.add_zipcode(&Zipcode {
            zipcode: "ABCDE".to_string(),
            region: "CAMX".to_string(),
            city: None,
            state: None,
        });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_lookup_zipcode() {
        let storage = create_test_storage();
        assert_eq!(
            storage.lookup_zipcode("san francisco", "ca").unwrap(),
            Some("94103".to_string())
        );
        assert_eq!(
            storage.lookup_zipcode("Denver", "CO").unwrap(),
            Some("80202".to_string())
        );
        assert_eq!(storage.lookup_zipcode("Boston", "MA").unwrap(), None);
    }

    #[test]
    fn test_matching_cars_by_model_year() {
        let storage = create_test_storage();
        let cars = storage
            .matching_cars(&CarSpec::new("honda", "CIVIC", 2015))
            .unwrap();
        assert_eq!(cars.len(), 3);
    }

    #[test]
    fn test_matching_cars_narrowed() {
        let storage = create_test_storage();
        let spec = CarSpec::new("Honda", "Civic", 2015).with_cylinders(4);
        assert_eq!(storage.matching_cars(&spec).unwrap().len(), 2);

        let spec = spec.with_transmission("manual (m6)");
        let cars = storage.matching_cars(&spec).unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(cars[0].grams_co2_per_mile, Some(300.0));
    }

    #[test]
    fn test_car_factor_averages_rows_with_factor() {
        let storage = create_test_storage();
        let factor = storage
            .car_factor(&CarSpec::new("Honda", "Civic", 2015))
            .unwrap();
        // The six-cylinder row has no factor and is skipped.
        assert!((factor - 290.0).abs() < 1e-9);
    }

    #[test]
    fn test_car_factor_no_match() {
        let storage = create_test_storage();
        let err = storage
            .car_factor(&CarSpec::new("Honda", "Civic", 1999))
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingCar { .. }));

        let err = storage
            .car_factor(&CarSpec::new("Honda", "Civic", 2015).with_cylinders(6))
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingCar { .. }));
    }

    #[test]
    fn test_transit_types() {
        let storage = create_test_storage();
        storage
            .add_transit_type(&TransitType {
                id: None,
                name: "light rail".to_string(),
                grams_co2_per_mile: 160.0,
            })
            .unwrap();

        let names: Vec<String> = storage
            .transit_types()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["bus".to_string(), "light rail".to_string()]);

        let bus = storage.transit_type("BUS").unwrap().unwrap();
        assert!((bus.grams_co2_per_mile - 290.0).abs() < f64::EPSILON);
        assert!(storage.transit_type("ferry").unwrap().is_none());
    }

    #[test]
    fn test_import_is_atomic() {
        let storage = Storage::open_in_memory().unwrap();
        let batch = RegistryImport {
            regions: vec![Region {
                id: None,
                name: "NEWE".to_string(),
                lb_co2e_per_mwh: 700.0,
            }],
            zipcodes: vec![Zipcode {
                zipcode: "02139".to_string(),
                region: "MISSING".to_string(),
                city: None,
                state: None,
            }],
            ..RegistryImport::default()
        };

        assert!(storage.import_registry(&batch).is_err());
        assert!(storage.region("NEWE").unwrap().is_none());
    }

    #[test]
    fn test_registry_import_from_json() {
        let json = r#"{
            "regions": [{"name": "NWPP", "lb_co2e_per_mwh": 842.6}],
            "zipcodes": [{"zipcode": "97201", "region": "NWPP", "city": "Portland", "state": "OR"}]
        }"#;
        let batch: RegistryImport = serde_json::from_str(json).unwrap();
        assert!(batch.cars.is_empty());

        let storage = Storage::open_in_memory().unwrap();
        let summary = storage.import_registry(&batch).unwrap();
        assert_eq!(summary.regions, 1);
        assert_eq!(summary.zipcodes, 1);
        assert_eq!(storage.region_for_zipcode("97201").unwrap().name, "NWPP");
    }
}
