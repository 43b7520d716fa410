use std::{fmt::Display, str::FromStr};

use world_imagery_downloader::MAX_ZOOM;

pub fn is_numeric_min<T>(
    min: T,
) -> impl Fn(&str) -> Result<T, String> + Clone + Send + Sync + 'static
where
    T: FromStr + PartialOrd + Display + Copy + Send + Sync + 'static,
{
    move |v: &str| {
        let val = v.parse::<T>().map_err(|_| "must be numeric".to_owned())?;

        if val < min {
            return Err(format!("must be >= {}", min));
        }

        Ok(val)
    }
}

pub fn is_zoom(v: &str) -> Result<u8, String> {
    let val = v.parse::<u8>().map_err(|_| "must be numeric".to_owned())?;

    if val > MAX_ZOOM {
        return Err(format!("must be <= {}", MAX_ZOOM));
    }

    Ok(val)
}

pub fn is_latitude(v: &str) -> Result<f64, String> {
    let val = v.parse::<f64>().map_err(|_| "must be numeric".to_owned())?;

    if !(val > -90f64 && val < 90f64) {
        return Err("must be between -90° and 90° (exclusive)".to_owned());
    }

    Ok(val)
}

pub fn is_longitude(v: &str) -> Result<f64, String> {
    let val = v.parse::<f64>().map_err(|_| "must be numeric".to_owned())?;

    if !(-180f64..=180f64).contains(&val) {
        return Err("must be between -180° and 180°".to_owned());
    }

    Ok(val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_excludes_poles() {
        assert_eq!(is_latitude("-16.5"), Ok(-16.5));
        assert!(is_latitude("90").is_err());
        assert!(is_latitude("-90").is_err());
        assert!(is_latitude("NaN").is_err());
        assert!(is_latitude("north").is_err());
    }

    #[test]
    fn longitude_includes_antimeridian() {
        assert_eq!(is_longitude("180"), Ok(180.0));
        assert_eq!(is_longitude("-180"), Ok(-180.0));
        assert!(is_longitude("180.5").is_err());
    }

    #[test]
    fn zoom_bounds() {
        assert_eq!(is_zoom("0"), Ok(0));
        assert_eq!(is_zoom("23"), Ok(23));
        assert!(is_zoom("24").is_err());
        assert!(is_zoom("-1").is_err());
    }

    #[test]
    fn numeric_min() {
        let at_least_one = is_numeric_min(1usize);
        assert_eq!(at_least_one("64"), Ok(64));
        assert!(at_least_one("0").is_err());
        assert!(at_least_one("many").is_err());
    }
}
