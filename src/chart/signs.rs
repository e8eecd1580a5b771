use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZodiacSign {
    Aries = 0,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

const SIGNS: [ZodiacSign; 12] = [
    ZodiacSign::Aries,
    ZodiacSign::Taurus,
    ZodiacSign::Gemini,
    ZodiacSign::Cancer,
    ZodiacSign::Leo,
    ZodiacSign::Virgo,
    ZodiacSign::Libra,
    ZodiacSign::Scorpio,
    ZodiacSign::Sagittarius,
    ZodiacSign::Capricorn,
    ZodiacSign::Aquarius,
    ZodiacSign::Pisces,
];

// English -> Portuguese
const TRANSLATIONS: [(&str, &str); 12] = [
    ("Aries", "Áries"),
    ("Taurus", "Touro"),
    ("Gemini", "Gêmeos"),
    ("Cancer", "Câncer"),
    ("Leo", "Leão"),
    ("Virgo", "Virgem"),
    ("Libra", "Libra"),
    ("Scorpio", "Escorpião"),
    ("Sagittarius", "Sagitário"),
    ("Capricorn", "Capricórnio"),
    ("Aquarius", "Aquário"),
    ("Pisces", "Peixes"),
];

impl ZodiacSign {
    pub fn from_longitude(longitude: f64) -> Self {
        let index = (longitude.rem_euclid(360.0) / 30.0).floor() as usize;
        SIGNS[index.min(11)]
    }

    pub fn english_name(self) -> &'static str {
        TRANSLATIONS[self as usize].0
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.english_name())
    }
}

/// Portuguese name for an English sign name. Unknown names pass through.
pub fn translate_sign(english: &str) -> String {
    TRANSLATIONS
        .iter()
        .find(|(en, _)| *en == english)
        .map(|(_, pt)| (*pt).to_string())
        .unwrap_or_else(|| english.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_boundaries() {
        assert_eq!(ZodiacSign::from_longitude(0.0), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(29.999), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(30.0), ZodiacSign::Taurus);
        assert_eq!(ZodiacSign::from_longitude(359.9), ZodiacSign::Pisces);
        assert_eq!(ZodiacSign::from_longitude(360.0), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(-1.0), ZodiacSign::Pisces);
    }

    #[test]
    fn translates_every_sign() {
        for sign in SIGNS {
            assert_ne!(translate_sign(sign.english_name()), "");
        }
        assert_eq!(translate_sign("Scorpio"), "Escorpião");
        assert_eq!(translate_sign(&ZodiacSign::Capricorn.to_string()), "Capricórnio");
    }

    #[test]
    fn unknown_sign_passes_through() {
        assert_eq!(translate_sign("Ophiuchus"), "Ophiuchus");
    }
}
