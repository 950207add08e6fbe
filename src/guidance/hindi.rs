//! Hindi guidance text for each canonical disease/pest

use super::DiseaseKey;

pub(super) struct GuideEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub treatment_steps: &'static [&'static str],
    pub recommended_pesticides: &'static [&'static str],
}

pub(super) fn entry(key: DiseaseKey) -> &'static GuideEntry {
    match key {
        DiseaseKey::Aphids => &APHIDS,
        DiseaseKey::TargetSpot => &TARGET_SPOT,
        DiseaseKey::PowderyMildew => &POWDERY_MILDEW,
        DiseaseKey::BacterialBlight => &BACTERIAL_BLIGHT,
        DiseaseKey::ArmyWorms => &ARMY_WORMS,
        DiseaseKey::Healthy => &HEALTHY,
    }
}

pub(super) const UNKNOWN_NAME: &str = "अज्ञात";
pub(super) const UNKNOWN_DESCRIPTION: &str = "रोग की पहचान नहीं हो सकी।";
pub(super) const UNAVAILABLE_DESCRIPTION: &str = "इस रोग या कीट की जानकारी उपलब्ध नहीं है।";

static APHIDS: GuideEntry = GuideEntry {
    name: "माहू (एफिड्स) का प्रकोप",
    description: "पत्तियों पर छोटे हरे या काले रंग के कीड़े दिखाई देते हैं, जिससे पत्तियाँ मुड़ जाती हैं और पौधा कमजोर हो जाता है।",
    treatment_steps: &[
        "प्रभावित पत्तियों को तोड़कर नष्ट करें",
        "खेत में चींटियों को नियंत्रित करें",
        "नीम तेल का छिड़काव करें (3–5 मिली प्रति लीटर पानी)",
        "खेत को अधिक नाइट्रोजन खाद से बचाएँ",
    ],
    recommended_pesticides: &[
        "इमिडाक्लोप्रिड 17.8 SL (0.3 मिली / लीटर पानी)",
        "थायोमेथोक्साम 25 WG (0.25 ग्राम / लीटर पानी)",
    ],
};

static TARGET_SPOT: GuideEntry = GuideEntry {
    name: "टारगेट स्पॉट रोग",
    description: "पत्तियों पर भूरे रंग के गोल धब्बे बनते हैं, जिनके चारों ओर हल्का घेरा दिखाई देता है।",
    treatment_steps: &[
        "संक्रमित पत्तियों को हटाकर नष्ट करें",
        "खेत में हवा का अच्छा संचार बनाए रखें",
        "ऊपर से सिंचाई (स्प्रिंकलर) से बचें",
    ],
    recommended_pesticides: &[
        "मैनकोजेब 75 WP (2 ग्राम / लीटर पानी)",
        "क्लोरोथालोनिल 75 WP (2 ग्राम / लीटर पानी)",
    ],
};

static POWDERY_MILDEW: GuideEntry = GuideEntry {
    name: "चूर्णी फफूंदी रोग",
    description: "पत्तियों की सतह पर सफेद पाउडर जैसी परत दिखाई देती है, जिससे पत्तियाँ पीली पड़ जाती हैं।",
    treatment_steps: &[
        "संक्रमित पत्तियों को नष्ट करें",
        "खेत में नमी कम रखें",
        "समय पर फफूंदनाशी दवा का छिड़काव करें",
    ],
    recommended_pesticides: &[
        "वेटेबल सल्फर 80 WP (2 ग्राम / लीटर पानी)",
        "हेक्साकोनाज़ोल 5 EC (1 मिली / लीटर पानी)",
    ],
};

static BACTERIAL_BLIGHT: GuideEntry = GuideEntry {
    name: "बैक्टीरियल ब्लाइट (कपास का झुलसा रोग)",
    description: "पत्तियों पर पानी से भीगे हुए कोणीय धब्बे बनते हैं, जो बाद में काले या भूरे हो जाते हैं।",
    treatment_steps: &[
        "रोगग्रस्त पौधों को खेत से निकालकर नष्ट करें",
        "स्वस्थ और प्रमाणित बीजों का ही उपयोग करें",
        "खेत में जलभराव से बचें",
        "फसल चक्र (क्रॉप रोटेशन) अपनाएँ",
    ],
    recommended_pesticides: &[
        "कॉपर ऑक्सीक्लोराइड 50 WP (3 ग्राम / लीटर पानी)",
        "स्ट्रेप्टोसाइक्लिन (0.5 ग्राम / 10 लीटर पानी)",
    ],
};

static ARMY_WORMS: GuideEntry = GuideEntry {
    name: "आर्मी वर्म (सेना कीट)",
    description: "ये कीट पत्तियों को झुंड में खाकर पौधे को पूरी तरह नष्ट कर सकते हैं।",
    treatment_steps: &[
        "प्रारंभिक अवस्था में कीटों को हाथ से नष्ट करें",
        "रात में खेत का निरीक्षण करें क्योंकि कीट सक्रिय रहते हैं",
        "प्रकाश प्रपंच (लाइट ट्रैप) का उपयोग करें",
    ],
    recommended_pesticides: &[
        "इमामेक्टिन बेंजोएट 5 SG (0.4 ग्राम / लीटर पानी)",
        "स्पिनोसैड 45 SC (0.3 मिली / लीटर पानी)",
    ],
};

static HEALTHY: GuideEntry = GuideEntry {
    name: "स्वस्थ पौधा",
    description: "पौधा पूरी तरह स्वस्थ है और किसी रोग या कीट का प्रकोप नहीं है।",
    treatment_steps: &[
        "नियमित निरीक्षण करते रहें",
        "संतुलित खाद और सही समय पर सिंचाई करें",
    ],
    recommended_pesticides: &[],
};
