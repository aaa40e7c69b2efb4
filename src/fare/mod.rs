use serde::Serialize;

use crate::models::route::Route;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarPackage {
    pub slug: &'static str,
    pub base_price_in_cents: f64,
}

pub const CAR_PACKAGES: [CarPackage; 4] = [
    CarPackage {
        slug: "suv",
        base_price_in_cents: 200.0,
    },
    CarPackage {
        slug: "sedan",
        base_price_in_cents: 350.0,
    },
    CarPackage {
        slug: "van",
        base_price_in_cents: 400.0,
    },
    CarPackage {
        slug: "luxury",
        base_price_in_cents: 1000.0,
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingConfig {
    pub price_per_km_in_cents: f64,
    pub price_per_minute_in_cents: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_km_in_cents: 150.0,
            price_per_minute_in_cents: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FareEstimate {
    pub package_slug: String,
    pub total_price_in_cents: f64,
}

pub fn estimate_fares(route: &Route, pricing: &PricingConfig) -> Vec<FareEstimate> {
    let distance_fare = route.distance_km() * pricing.price_per_km_in_cents;
    let time_fare = route.duration_minutes() * pricing.price_per_minute_in_cents;

    CAR_PACKAGES
        .iter()
        .map(|package| FareEstimate {
            package_slug: package.slug.to_string(),
            total_price_in_cents: (package.base_price_in_cents + distance_fare + time_fare).round(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{CAR_PACKAGES, PricingConfig, estimate_fares};
    use crate::models::route::Route;

    fn route(distance_m: f64, duration_s: f64) -> Route {
        Route {
            distance: distance_m,
            duration: duration_s,
            geometry: Vec::new(),
        }
    }

    #[test]
    fn one_estimate_per_package_in_table_order() {
        let fares = estimate_fares(&route(1_000.0, 60.0), &PricingConfig::default());

        let slugs: Vec<&str> = fares.iter().map(|f| f.package_slug.as_str()).collect();
        let expected: Vec<&str> = CAR_PACKAGES.iter().map(|p| p.slug).collect();
        assert_eq!(slugs, expected);
    }

    #[test]
    fn total_is_base_plus_distance_plus_time() {
        // 5 km, 10 minutes: 5 * 150 + 10 * 25 = 1000 on top of the base
        let fares = estimate_fares(&route(5_000.0, 600.0), &PricingConfig::default());

        assert_eq!(fares[0].total_price_in_cents, 1_200.0);
        assert_eq!(fares[3].total_price_in_cents, 2_000.0);
    }

    #[test]
    fn zero_length_route_costs_the_base_price() {
        let fares = estimate_fares(&route(0.0, 0.0), &PricingConfig::default());
        for (fare, package) in fares.iter().zip(CAR_PACKAGES.iter()) {
            assert_eq!(fare.total_price_in_cents, package.base_price_in_cents);
        }
    }
}
