use geo::{Coord, Geometry, LineString, Point};
use ndarray::Array2;
use proptest::prelude::*;

use crate::{
    apply_boost, create_raster, line::rasterize_line, point_to_geometry_distance, BoundingBox,
    PixelCoordinate, PixelMapping, RoadRasterizer,
};

/// 非零跨度，正负皆可
fn span() -> impl Strategy<Value = f64> {
    prop_oneof![-100f64..-0.01, 0.01f64..100.]
}

fn bbox() -> impl Strategy<Value = BoundingBox> {
    (-180f64..180., -90f64..90., span(), span()).prop_map(|(lon, lat, width, height)| {
        BoundingBox::new((lon, lat), (lon + width, lat + height))
    })
}

fn coord() -> impl Strategy<Value = Coord<f64>> {
    (-1000f64..1000., -1000f64..1000.).prop_map(|(x, y)| Coord { x, y })
}

proptest! {
    #[test]
    fn pixel_round_trip(
        bbox in bbox(),
        (width, height, col, row) in (1usize..300, 1usize..300)
            .prop_flat_map(|(w, h)| (Just(w), Just(h), 0..w, 0..h)),
    ) {
        let mapping = PixelMapping::new(&bbox, width, height).unwrap();
        let geo = mapping.pixel_to_geo(row, col);
        prop_assert_eq!(mapping.geo_to_pixel(geo), PixelCoordinate { row, col });
    }

    #[test]
    fn pixel_is_always_inside_raster(
        bbox in bbox(),
        width in 1usize..300,
        height in 1usize..300,
        x in proptest::num::f64::ANY,
        y in proptest::num::f64::ANY,
    ) {
        let mapping = PixelMapping::new(&bbox, width, height).unwrap();
        let pixel = mapping.geo_to_pixel(Coord { x, y });
        prop_assert!(pixel.row < height);
        prop_assert!(pixel.col < width);
    }

    #[test]
    fn distance_is_non_negative_and_zero_on_vertices(
        vertices in proptest::collection::vec(coord(), 2..8),
        point in coord(),
    ) {
        let road: Geometry<f64> = LineString::new(vertices.clone()).into();
        let distance = point_to_geometry_distance(Point::from(point), &road).unwrap();
        prop_assert!(distance >= 0.);

        for vertex in vertices {
            let on_road = point_to_geometry_distance(Point::from(vertex), &road).unwrap();
            prop_assert!(on_road < 1e-9);
        }
    }

    #[test]
    fn boost_stays_in_unit_range(
        values in proptest::collection::vec(-1e6f64..1e6, 1..64),
        level in -1e4f64..1e4,
    ) {
        let mut image = Array2::from_shape_vec((1, values.len()), values).unwrap();
        apply_boost(&mut image, level);
        prop_assert!(image.iter().all(|value| (0. ..=1.).contains(value)));
    }

    #[test]
    fn line_covers_both_endpoints(
        (width, height, start, end) in (1usize..64, 1usize..64).prop_flat_map(|(w, h)| {
            (Just(w), Just(h), (0..h, 0..w), (0..h, 0..w))
        }),
    ) {
        let bbox = BoundingBox::new((0., 0.), (width as f64, height as f64));
        let mut image = create_raster(width, height);
        let mut rasterizer = RoadRasterizer::new(&mut image, &bbox, 1.0).unwrap();
        let start = PixelCoordinate { row: start.0, col: start.1 };
        let end = PixelCoordinate { row: end.0, col: end.1 };
        rasterize_line(start, end, &mut rasterizer);

        prop_assert_eq!(image[[start.row, start.col]], 1.0);
        prop_assert_eq!(image[[end.row, end.col]], 1.0);
        let steps = start.row.abs_diff(end.row).max(start.col.abs_diff(end.col));
        prop_assert_eq!(image.sum(), (steps + 1) as f64);
    }
}
