//! Image prompt synthesis from location and weather.

use skyframe_weather::{Location, WeatherInfo};

const STYLE: &str = "Style: shot on a medium format camera with a 120mm macro lens, \
natural skin tones and rich tonal gradations. Soft directional daylight. f/14 for deep \
focus, 1/500 sec, ISO 640, clean low-noise detail. Warm color rendition with preserved \
highlights, 4:3 aspect ratio, gentle corner falloff, crisp micro-contrast. All sign text \
must be sharp and legible.";

/// Build the generation prompt for one run.
///
/// Pure and total: the same inputs always give the same text, and unknown
/// weather values are interpolated as-is.
pub fn build_prompt(location: &Location, weather: &WeatherInfo) -> String {
    let place = if weather.country.is_empty() {
        weather.city.clone()
    } else {
        format!("{}, {}", weather.city, weather.country)
    };

    format!(
        "Lifestyle magazine cover photo of an outdoor street scene in {place}, with people \
         dressed in a way that reflects the local character, colorful fabrics and a clear \
         fashion style. Street signs and direction signs nearby show the words \"{sign}\" in \
         a bold, easy-to-read font. Some people are busy with their phones, taking selfies \
         or showing each other their screens. The scene takes place during {description} \
         weather, with a temperature around {temp}°C. GPS coordinates: {location}. {STYLE}",
        place = place,
        sign = weather.city.to_uppercase(),
        description = weather.description,
        temp = weather.temperature,
        location = location,
    )
}
