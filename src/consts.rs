pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

pub const DEFAULT_CALLS_URL: &str = "https://api.openai.com/v1/realtime/calls";
pub const DATA_CHANNEL_LABEL: &str = "oai-events";
pub const SESSION_TYPE: &str = "realtime";
pub const SESSION_ID_PREFIX: &str = "aproof";

pub const DEFAULT_QUIET_PERIOD_MS: u64 = 3_000;
pub const DEFAULT_BROKER_TIMEOUT_MS: u64 = 12_000;
/// Lines of transcript sent as `recentTranscript`.
pub const DEFAULT_RECENT_WINDOW: usize = 4;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
pub const VAD_THRESHOLD: f32 = 0.5;
pub const VAD_PREFIX_PADDING_MS: u32 = 300;
pub const VAD_SILENCE_DURATION_MS: u32 = 1200;

pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
pub const CAPTURE_CHANNELS: u16 = 1;

pub const COMMAND_CAPACITY: usize = 16;
pub const EVENT_CAPACITY: usize = 256;

pub const INTERVIEWER_INSTRUCTIONS: &str = "Je bent een klinisch interviewer die een gesprek voert met een patiënt in het Nederlands. Je doel is om informatie te verzamelen over het functioneren van de patiënt op de 9 A-PROOF ICF-domeinen:

1. Energie (b1300) - Hoe is uw energieniveau? Bent u moe?
2. Aandacht (b140) - Kunt u zich goed concentreren?
3. Emotioneel (b152) - Hoe voelt u zich emotioneel?
4. Ademhaling (b440) - Heeft u last van kortademigheid?
5. Inspanning (b455) - Hoe gaat het met lichamelijke inspanning?
6. Gewicht (b530) - Is uw gewicht stabiel?
7. Lopen (d450) - Hoe gaat het met lopen en mobiliteit?
8. Eten (d550) - Gaat het eten goed?
9. Werk (d840) - Kunt u uw werk of dagelijkse bezigheden uitvoeren?

Richtlijnen:
- Stel open, empathische vragen in eenvoudig Nederlands
- Vraag door op genoemde klachten
- Behandel maximaal 2-3 domeinen per beurt
- Wees warm en professioneel
- Gebruik korte zinnen

Begin met een begroeting en vraag hoe het met de patiënt gaat.";
