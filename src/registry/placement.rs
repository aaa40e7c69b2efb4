use rand::Rng;
use rand::seq::SliceRandom;

use crate::geo::{GEOHASH_PRECISION, geohash};
use crate::models::driver::Driver;
use crate::models::route::Coordinate;

const PREDEFINED_ROUTES: &[&[[f64; 2]]] = &[
    &[
        [37.7858, -122.4064],
        [37.7868, -122.4044],
        [37.7879, -122.4031],
        [37.7895, -122.4012],
    ],
    &[
        [37.7749, -122.4194],
        [37.7760, -122.4175],
        [37.7772, -122.4158],
    ],
    &[
        [37.8024, -122.4058],
        [37.8010, -122.4075],
        [37.7996, -122.4093],
        [37.7983, -122.4110],
    ],
    &[
        [37.7599, -122.4148],
        [37.7615, -122.4131],
        [37.7632, -122.4117],
    ],
];

const DRIVER_NAMES: &[&str] = &[
    "Lando Norris",
    "Ayrton Reyes",
    "Mika Salo",
    "Kimi Virtanen",
    "Nico Hulk",
    "Sofia Lindqvist",
];

const PLATE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ";

pub fn place_driver<R: Rng + ?Sized>(driver_id: &str, package_slug: &str, rng: &mut R) -> Driver {
    let route_index = rng.gen_range(0..PREDEFINED_ROUTES.len());
    let [latitude, longitude] = PREDEFINED_ROUTES[route_index][0];
    let location = Coordinate::new(latitude, longitude);

    Driver {
        id: driver_id.to_string(),
        name: DRIVER_NAMES
            .choose(rng)
            .copied()
            .unwrap_or("Driver")
            .to_string(),
        profile_picture: avatar_url(route_index),
        car_plate: random_plate(rng),
        geohash: geohash(&location, GEOHASH_PRECISION).unwrap_or_default(),
        package_slug: package_slug.to_string(),
        location,
    }
}

fn avatar_url(index: usize) -> String {
    format!("https://randomuser.me/api/portraits/lego/{index}.jpg")
}

fn random_plate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut plate = String::with_capacity(7);
    for _ in 0..3 {
        let letter = PLATE_LETTERS[rng.gen_range(0..PLATE_LETTERS.len())];
        plate.push(letter as char);
    }
    plate.push('-');
    for _ in 0..3 {
        plate.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    plate
}
