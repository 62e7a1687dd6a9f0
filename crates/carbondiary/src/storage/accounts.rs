//! Users and the profile they log against: residences and cars.

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{normalize_zipcode, CarSpec, Residence, User, UserCar};

use super::Storage;

impl Storage {
    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserExists`] if the email is taken, or
    /// [`Error::InvalidInput`] if the email or password is empty.
    pub fn register(&self, email: &str, password: &str, name: &str, username: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::invalid_input("email and password are required"));
        }

        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 COLLATE NOCASE)",
            [email],
            |row| row.get(0),
        )?;
        if exists {
            return Err(Error::UserExists {
                email: email.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO users (email, password, name, username) VALUES (?1, ?2, ?3, ?4)",
            params![email, password, name, username],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("Registered user {} ({})", id, email);

        Ok(User {
            id,
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            username: username.to_string(),
        })
    }

    /// Check an email and password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if no user has this email and
    /// password.
    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .conn
            .query_row(
                r"
                SELECT id, email, password, name, username FROM users
                WHERE email = ?1 COLLATE NOCASE
                ",
                [email.trim()],
                Self::row_to_user,
            )
            .optional()?;

        match user {
            Some(user) if user.password == password => {
                debug!("User {} logged in", user.id);
                Ok(user)
            }
            _ => {
                warn!("Failed login for {}", email);
                Err(Error::InvalidCredentials)
            }
        }
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no such user.
    pub fn user(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, email, password, name, username FROM users WHERE id = ?1",
                [id],
                Self::row_to_user,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("user", id))
    }

    /// Add a residence to a user's profile.
    ///
    /// The zip code must be in the registry so the residence has a grid
    /// region. Marking a residence as default clears the flag on the user's
    /// other residences; a user's first residence is always the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the zip code is malformed or unknown, the address
    /// is already used by this user, or the database operation fails.
    pub fn add_residence(
        &self,
        user_id: i64,
        zipcode: &str,
        address: &str,
        is_default: bool,
        residents: Option<u32>,
    ) -> Result<Residence> {
        let zipcode = normalize_zipcode(zipcode)?;
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::invalid_input("residence address is required"));
        }
        self.user(user_id)?;
        self.region_for_zipcode(&zipcode)?;

        if self.residence_by_address(user_id, address)?.is_some() {
            return Err(Error::invalid_input(format!(
                "residence '{address}' already exists"
            )));
        }

        let is_default = is_default || self.residences(user_id)?.is_empty();

        let tx = self.conn.unchecked_transaction()?;
        if is_default {
            self.conn.execute(
                "UPDATE residences SET is_default = 0 WHERE user_id = ?1",
                [user_id],
            )?;
        }
        self.conn.execute(
            r"
            INSERT INTO residences (user_id, zipcode, address, is_default, residents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![user_id, zipcode, address, is_default, residents],
        )?;
        let id = self.conn.last_insert_rowid();
        tx.commit()?;

        debug!("Added residence {} for user {}", id, user_id);
        Ok(Residence {
            id,
            user_id,
            zipcode,
            address: address.to_string(),
            is_default,
            residents,
        })
    }

    /// List a user's residences, default first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn residences(&self, user_id: i64) -> Result<Vec<Residence>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, user_id, zipcode, address, is_default, residents
            FROM residences WHERE user_id = ?1
            ORDER BY is_default DESC, id
            ",
        )?;
        let residences = stmt
            .query_map([user_id], Self::row_to_residence)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(residences)
    }

    /// Find one of a user's residences.
    ///
    /// `key` is a residence id or an address. With no key the default
    /// residence is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user has no such residence.
    pub fn residence(&self, user_id: i64, key: Option<&str>) -> Result<Residence> {
        let found = match key {
            None => self.residences(user_id)?.into_iter().find(|r| r.is_default),
            Some(key) => match key.trim().parse::<i64>() {
                Ok(id) => self
                    .residences(user_id)?
                    .into_iter()
                    .find(|r| r.id == id),
                Err(_) => self.residence_by_address(user_id, key.trim())?,
            },
        };
        found.ok_or_else(|| Error::not_found("residence", key.unwrap_or("default")))
    }

    fn residence_by_address(&self, user_id: i64, address: &str) -> Result<Option<Residence>> {
        let residence = self
            .conn
            .query_row(
                r"
                SELECT id, user_id, zipcode, address, is_default, residents
                FROM residences WHERE user_id = ?1 AND address = ?2 COLLATE NOCASE
                ",
                params![user_id, address],
                Self::row_to_residence,
            )
            .optional()?;
        Ok(residence)
    }

    /// Add a car to a user's profile.
    ///
    /// The registry factor for the spec is averaged and stored with the car,
    /// so later registry imports do not change past emissions. The default
    /// flag behaves as for residences.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatchingCar`] if the registry has no factor for the
    /// spec, or an error if the database operation fails.
    pub fn add_user_car(&self, user_id: i64, spec: &CarSpec, is_default: bool) -> Result<UserCar> {
        self.user(user_id)?;
        let factor = self.car_factor(spec)?;
        let is_default = is_default || self.user_cars(user_id)?.is_empty();

        let tx = self.conn.unchecked_transaction()?;
        if is_default {
            self.conn.execute(
                "UPDATE user_cars SET is_default = 0 WHERE user_id = ?1",
                [user_id],
            )?;
        }
        self.conn.execute(
            r"
            INSERT INTO user_cars (user_id, make, model, year, cylinders, transmission,
                                   grams_co2_per_mile, is_default)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                user_id,
                spec.make,
                spec.model,
                spec.year,
                spec.cylinders,
                spec.transmission,
                factor,
                is_default,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tx.commit()?;

        info!("Added {} for user {} at {:.1} g/mi", spec, user_id, factor);
        Ok(UserCar {
            id,
            user_id,
            spec: spec.clone(),
            grams_co2_per_mile: factor,
            is_default,
        })
    }

    /// List a user's cars, default first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn user_cars(&self, user_id: i64) -> Result<Vec<UserCar>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, user_id, make, model, year, cylinders, transmission,
                   grams_co2_per_mile, is_default
            FROM user_cars WHERE user_id = ?1
            ORDER BY is_default DESC, id
            ",
        )?;
        let cars = stmt
            .query_map([user_id], Self::row_to_user_car)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cars)
    }

    /// Get one of a user's cars, or the default car when `id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user has no such car.
    pub fn user_car(&self, user_id: i64, id: Option<i64>) -> Result<UserCar> {
        self.user_cars(user_id)?
            .into_iter()
            .find(|car| id.map_or(car.is_default, |id| car.id == id))
            .ok_or_else(|| {
                Error::not_found("car", id.map_or_else(|| "default".to_string(), |id| id.to_string()))
            })
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            name: row.get(3)?,
            username: row.get(4)?,
        })
    }

    fn row_to_residence(row: &rusqlite::Row) -> rusqlite::Result<Residence> {
        Ok(Residence {
            id: row.get(0)?,
            user_id: row.get(1)?,
            zipcode: row.get(2)?,
            address: row.get(3)?,
            is_default: row.get(4)?,
            residents: row.get(5)?,
        })
    }

    fn row_to_user_car(row: &rusqlite::Row) -> rusqlite::Result<UserCar> {
        Ok(UserCar {
            id: row.get(0)?,
            user_id: row.get(1)?,
            spec: CarSpec {
                make: row.get(2)?,
                model: row.get(3)?,
                year: row.get(4)?,
                cylinders: row.get(5)?,
                transmission: row.get(6)?,
            },
            grams_co2_per_mile: row.get(7)?,
            is_default: row.get(8)?,
        })
    }
}
