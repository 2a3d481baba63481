//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical hash, BIP-340 signatures and the NIP-44
//! cipher to values other Nostr implementations produce. The events are real
//! relay traffic, so their ids and signatures were computed elsewhere.

use nostr_kernel_core::{compute_event_id, validate_event, Event, Keypair, Rumor};
use nostr_kernel_crypto::nip44::{self, calc_padded_len, ConversationKey};

/// A golden event: JSON as received and the id it must hash to.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Event JSON. Field order and whitespace vary on purpose.
    pub json: &'static str,
    /// Expected event id (hex).
    pub expected_id: &'static str,
    /// Whether the JSON carries a valid signature. Rumors do not.
    pub signed: bool,
}

/// A BIP-340 signing vector.
#[derive(Debug, Clone)]
pub struct Bip340Vector {
    pub name: &'static str,
    pub secret: &'static str,
    pub public_key: &'static str,
    pub aux: [u8; 32],
    pub message: [u8; 32],
    pub signature: &'static str,
}

/// A NIP-44 v2 vector: two secret keys, the shared conversation key and one
/// payload encrypted under a fixed nonce.
#[derive(Debug, Clone)]
pub struct Nip44Vector {
    pub name: &'static str,
    pub sec1: &'static str,
    pub sec2: &'static str,
    pub conversation_key: &'static str,
    pub nonce: &'static str,
    pub plaintext: &'static str,
    pub payload: &'static str,
}

/// `(unpadded length, padded length)` pairs from the NIP-44 reference.
pub const PADDING_TABLE: &[(usize, usize)] = &[
    (1, 32),
    (16, 32),
    (32, 32),
    (33, 64),
    (37, 64),
    (45, 64),
    (49, 64),
    (64, 64),
    (65, 96),
    (100, 128),
    (111, 128),
    (200, 224),
    (250, 256),
    (256, 256),
    (257, 320),
    (320, 320),
    (383, 384),
    (384, 384),
    (400, 448),
    (500, 512),
    (512, 512),
    (515, 640),
    (700, 768),
    (800, 896),
    (900, 1024),
    (1020, 1024),
    (65536, 65536),
];

/// Reply note with repeated `p` tags and an extra `seenOn` field.
pub const REPLY_NOTE_JSON: &str = r##"{
  "content": "Astral:\n\nhttps://void.cat/d/A5Fba5B1bcxwEmeyoD9nBs.webp\n\nIris:\n\nhttps://void.cat/d/44hTcVvhRps6xYYs99QsqA.webp\n\nSnort:\n\nhttps://void.cat/d/4nJD5TRePuQChM5tzteYbU.webp\n\nAmethyst agrees with Astral which I suspect are both wrong. nostr:npub13sx6fp3pxq5rl70x0kyfmunyzaa9pzt5utltjm0p8xqyafndv95q3saapa nostr:npub1v0lxxxxutpvrelsksy8cdhgfux9l6a42hsj2qzquu2zk7vc9qnkszrqj49 nostr:npub1g53mukxnjkcmr94fhryzkqutdz2ukq4ks0gvy5af25rgmwsl4ngq43drvk nostr:npub1gcxzte5zlkncx26j68ez60fzkvtkm9e0vrwdcvsjakxf9mu9qewqlfnj5z ",
  "created_at": 1683596206,
  "id": "98b574c3527f0ffb30b7271084e3f07480733c7289f8de424d29eae82e36c758",
  "kind": 1,
  "pubkey": "46fcbe3065eaf1ae7811465924e48923363ff3f526bd6f73d7c184b16bd8ce4d",
  "sig": "4aa5264965018fa12a326686ad3d3bd8beae3218dcc83689b19ca1e6baeb791531943c15363aa6707c7c0c8b2d601deca1f20c32078b2872d356cdca03b04cce",
  "tags": [
    [
      "e",
      "27ac621d7dc4a932e1a79f984308e7d20656dd6fddb2ce9cdfcb6a67b9a7bcc3",
      "",
      "root"
    ],
    [
      "e",
      "be7245af96210a0dd048cab4ad38e52dbd6c09a53ea21a7edb6be8898e5727cc",
      "",
      "reply"
    ],
    [
      "p",
      "22aa81510ee63fe2b16cae16e0921f78e9ba9882e2868e7e63ad6d08ae9b5954"
    ],
    [
      "p",
      "22aa81510ee63fe2b16cae16e0921f78e9ba9882e2868e7e63ad6d08ae9b5954"
    ],
    [
      "p",
      "3f770d65d3a764a9c5cb503ae123e62ec7598ad035d836e2a810f3877a745b24"
    ],
    [
      "p",
      "ec4d241c334311b3a304433ee3442be29d0e88e7ec19b85edf2bba29b93565e2"
    ],
    [
      "p",
      "0fe0b18b4dbf0e0aa40fcd47209b2a49b3431fc453b460efcf45ca0bd16bd6ac"
    ],
    [
      "p",
      "8c0da4862130283ff9e67d889df264177a508974e2feb96de139804ea66d6168"
    ],
    [
      "p",
      "63fe6318dc58583cfe16810f86dd09e18bfd76aabc24a0081ce2856f330504ed"
    ],
    [
      "p",
      "4523be58d395b1b196a9b8c82b038b6895cb02b683d0c253a955068dba1facd0"
    ],
    [
      "p",
      "460c25e682fda7832b52d1f22d3d22b3176d972f60dcdc3212ed8c92ef85065c"
    ]
  ],
  "seenOn": [
    "wss://nostr.wine/"
  ]
}"##;

/// Kind 14 rumor with an empty signature.
pub const CHAT_RUMOR_JSON: &str = r##"{
  "id": "6cccb576158965cf0f06fb4e476f85a02f0011ae783a4e905126a3db3871e43d",
  "pubkey": "ee6ea13ab9fe5c4a68eaf9b1a34fe014a66b40117c50ee2a614f4cda959b6e74",
  "created_at": 1698062466,
  "kind": 14,
  "tags": [
    [
      "p",
      "460c25e682fda7832b52d1f22d3d22b3176d972f60dcdc3212ed8c92ef85065c"
    ]
  ],
  "content": "Oh yeah I hadn't seen this ",
  "sig": ""
}"##;

/// Note with `imeta` tags and emoji content.
pub const IMETA_NOTE_JSON: &str = r##"{"id":"5fd48fd3fb2890a00538067869306d788ff4331896360dc9c7e43d43e01b481b","pubkey":"9770fb48aa3861dd393eb857e740f2df6f18e0ead43bad1d30c65e5c198200a6","created_at":1701673247,"kind":1,"tags":[["imeta","url https://image.nostr.build/790b061d9661df88b06feb7448694cc421671da42217ca8381f02b4def63707f.jpg","blurhash enF~?FRpNbkBjG.AkCbHfkafx_R+V^V_WVt9WBf6axoeoJf4bXWBaz","dim 1536x2048"],["imeta","url https://video.nostr.build/3dd8562e8306c3128a72dee888c0fe587c2b24b8b643ae19b82010aaab95c37c.mp4","blurhash e5A0~^S4R#W,j]~XR%s;o4j?s*M|t3t6ayxot9RiV[RjEH%3WBR%xb","dim 720x1280"],["imeta","url https://image.nostr.build/9249f13cb8df68e00706f4f1434b8f0cd731b0515479df06353a0aef7a798619.jpg","blurhash egFFpp$LV?kCjs.TRiaej[fP9xIpoKf6fksls+WBbHj[xZn$WWofjt","dim 1920x3412"],["t","iceland"],["r","https://image.nostr.build/790b061d9661df88b06feb7448694cc421671da42217ca8381f02b4def63707f.jpg"],["r","https://video.nostr.build/3dd8562e8306c3128a72dee888c0fe587c2b24b8b643ae19b82010aaab95c37c.mp4"],["r","https://image.nostr.build/9249f13cb8df68e00706f4f1434b8f0cd731b0515479df06353a0aef7a798619.jpg"]],"content":"Icelandic calm to your heart 💚😌\n\n(Memories from this summer)\n\n#Iceland , 2023 https://image.nostr.build/790b061d9661df88b06feb7448694cc421671da42217ca8381f02b4def63707f.jpg https://video.nostr.build/3dd8562e8306c3128a72dee888c0fe587c2b24b8b643ae19b82010aaab95c37c.mp4 https://image.nostr.build/9249f13cb8df68e00706f4f1434b8f0cd731b0515479df06353a0aef7a798619.jpg ","sig":"d6410be4b47bc97fca486eb619dd2507e7332bcd1049e405a047c90eedd2be46007c09d7702361b8442df78932e5da4055ee1c5fef08f938a4d39d828dc20957"}"##;

/// Community post whose content is itself escaped event JSON.
pub const COMMUNITY_POST_JSON: &str = r##"{"id":"d1f097d3d9fcfb00df0c8ab5469be6484b14707d1e947c574ed636281d8dfd26","pubkey":"dd664d5e4016433a8cd69f005ae1480804351789b59de5af06276de65633d319","created_at":1706435280,"kind":4550,"tags":[["a","34550:026d8b7e7bcc2b417a84f10edb71b427fe76069905090b147b401a6cf60c3f27:Catholic","wss://christpill.nostr1.com"],["e","0b8e4fade30fdb57f3887da224682fe9756ee79c408961e46393555bb0367022"],["p","026d8b7e7bcc2b417a84f10edb71b427fe76069905090b147b401a6cf60c3f27"],["k","1"]],"content":"{\"id\":\"0b8e4fade30fdb57f3887da224682fe9756ee79c408961e46393555bb0367022\",\"pubkey\":\"026d8b7e7bcc2b417a84f10edb71b427fe76069905090b147b401a6cf60c3f27\",\"created_at\":1698838786,\"kind\":1,\"tags\":[[\"a\",\"34550:026d8b7e7bcc2b417a84f10edb71b427fe76069905090b147b401a6cf60c3f27:Catholic\",\"\",\"reply\"],[\"t\",\"catholic\"],[\"t\",\"catholic\"]],\"content\":\"It's so funny at Mass, when you're a sacristan or something because everyone watches and emulates you, so if you forget to stand or kneel at the right moment, everyone remains seated.\\n\\nAnd when you're like, Oh woops! And stand up, there's a loud wave of people suddenly standing up, too. 😂\\n\\n#catholic\",\"sig\":\"92c087e6364dd6c1fbf3bf5baddd66f0d86019fb3ba95e36135345d7c8b137f2147de8d628ec974eb493c2dbce2ca581c56c146d282f06a930280c7addc4d021\"}","sig":"d67c067a08879138989275cb6f062f58e8a523b192bff5e65340becbac05060bb9c7ac6f75727c8fd2229f95a54fe404d18971950a72c1f17618535e7495e09d"}"##;

/// Get all golden event vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "reply note",
            json: REPLY_NOTE_JSON,
            expected_id: "98b574c3527f0ffb30b7271084e3f07480733c7289f8de424d29eae82e36c758",
            signed: true,
        },
        GoldenVector {
            name: "chat rumor",
            json: CHAT_RUMOR_JSON,
            expected_id: "6cccb576158965cf0f06fb4e476f85a02f0011ae783a4e905126a3db3871e43d",
            signed: false,
        },
        GoldenVector {
            name: "imeta note",
            json: IMETA_NOTE_JSON,
            expected_id: "5fd48fd3fb2890a00538067869306d788ff4331896360dc9c7e43d43e01b481b",
            signed: true,
        },
        GoldenVector {
            name: "community post",
            json: COMMUNITY_POST_JSON,
            expected_id: "d1f097d3d9fcfb00df0c8ab5469be6484b14707d1e947c574ed636281d8dfd26",
            signed: true,
        },
    ]
}

/// BIP-340 test vector 0.
pub fn bip340_vectors() -> Vec<Bip340Vector> {
    vec![Bip340Vector {
        name: "bip340 vector 0",
        secret: "0000000000000000000000000000000000000000000000000000000000000003",
        public_key: "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
        aux: [0u8; 32],
        message: [0u8; 32],
        signature: "e907831f80848d1069a5371b402410364bdf1c5f8307b0084c55f1ce2dca821525f66a4a85ea8b71e482a74f382d2ce5ebeee8fdb2172f477df4900d310536c0",
    }]
}

/// NIP-44 v2 reference vectors.
pub fn nip44_vectors() -> Vec<Nip44Vector> {
    vec![Nip44Vector {
        name: "nip44 sec1=1 sec2=2",
        sec1: "0000000000000000000000000000000000000000000000000000000000000001",
        sec2: "0000000000000000000000000000000000000000000000000000000000000002",
        conversation_key: "c41c775356fd92eadc63ff5a0dc1da211b268cbea22316767095b2871ea1412d",
        nonce: "0000000000000000000000000000000000000000000000000000000000000001",
        plaintext: "a",
        payload: "AgAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABee0G5VSK0/9YypIObAtDKfYEAjD35uVkHyB0F4DwrcNaCXlCWZKaArsGrY6M9wnuTMxWfp1RTN9Xga8no+kF5Vsb",
    }]
}

/// Hash a golden event, returning its computed id (hex).
pub fn compute_vector_id(vector: &GoldenVector) -> Result<String, String> {
    if vector.signed {
        let event = Event::from_json(vector.json).map_err(|e| e.to_string())?;
        let id = compute_event_id(
            event.pubkey(),
            event.created_at(),
            event.kind(),
            event.tags(),
            event.content(),
        );
        Ok(id.to_hex())
    } else {
        let rumor = Rumor::from_json(vector.json).map_err(|e| e.to_string())?;
        Ok(rumor.id().to_hex())
    }
}

fn check_event(vector: &GoldenVector) -> Result<(), String> {
    let id = compute_vector_id(vector)?;
    if id != vector.expected_id {
        return Err(format!("id {}", id));
    }
    if vector.signed {
        let event = Event::from_json(vector.json).map_err(|e| e.to_string())?;
        validate_event(&event).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn check_bip340(vector: &Bip340Vector) -> Result<(), String> {
    let keypair = Keypair::from_secret_hex(vector.secret).map_err(|e| e.to_string())?;
    if keypair.public_key().to_hex() != vector.public_key {
        return Err(format!("public key {}", keypair.public_key().to_hex()));
    }
    let sig = keypair
        .sign_with_aux(&vector.message, &vector.aux)
        .map_err(|e| e.to_string())?;
    if sig.to_hex() != vector.signature {
        return Err(format!("signature {}", sig.to_hex()));
    }
    Ok(())
}

fn check_nip44(vector: &Nip44Vector) -> Result<(), String> {
    let sec1 = Keypair::from_secret_hex(vector.sec1).map_err(|e| e.to_string())?;
    let sec2 = Keypair::from_secret_hex(vector.sec2).map_err(|e| e.to_string())?;
    let key = ConversationKey::derive(&sec1, &sec2.public_key()).map_err(|e| e.to_string())?;
    if hex::encode(key.as_bytes()) != vector.conversation_key {
        return Err(format!("conversation key {}", hex::encode(key.as_bytes())));
    }

    let nonce: [u8; 32] = hex::decode(vector.nonce)
        .map_err(|e| e.to_string())?
        .try_into()
        .map_err(|_| "nonce is not 32 bytes".to_string())?;
    let payload =
        nip44::encrypt_with_nonce(&key, vector.plaintext, &nonce).map_err(|e| e.to_string())?;
    if payload != vector.payload {
        return Err(format!("payload {}", payload));
    }

    let reverse = ConversationKey::derive(&sec2, &sec1.public_key()).map_err(|e| e.to_string())?;
    let plaintext = nip44::decrypt(&reverse, vector.payload).map_err(|e| e.to_string())?;
    if plaintext != vector.plaintext {
        return Err(format!("plaintext {:?}", plaintext));
    }
    Ok(())
}

/// Verify every vector, returning `(name, passed, detail)` per vector.
///
/// Call this to verify your implementation matches the reference.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    fn report(name: &str, result: Result<(), String>) -> (String, bool, String) {
        match result {
            Ok(()) => (name.to_string(), true, String::new()),
            Err(detail) => (name.to_string(), false, detail),
        }
    }

    let mut out = Vec::new();
    for v in all_vectors() {
        out.push(report(v.name, check_event(&v)));
    }
    for v in bip340_vectors() {
        out.push(report(v.name, check_bip340(&v)));
    }
    for v in nip44_vectors() {
        out.push(report(v.name, check_nip44(&v)));
    }
    let padding = PADDING_TABLE
        .iter()
        .find(|(len, padded)| calc_padded_len(*len) != *padded)
        .map_or(Ok(()), |(len, _)| {
            Err(format!("len {} pads to {}", len, calc_padded_len(*len)))
        });
    out.push(report("nip44 padding table", padding));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        for (name, passed, detail) in verify_all_vectors() {
            assert!(passed, "vector '{}' failed: {}", name, detail);
        }
    }

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            assert_eq!(
                compute_vector_id(&vector),
                compute_vector_id(&vector),
                "Vector '{}' produced different ids on rehashing",
                vector.name
            );
        }
    }

    #[test]
    fn test_tampered_vector_fails() {
        let mut vector = all_vectors().remove(0);
        vector.expected_id = "0000000000000000000000000000000000000000000000000000000000000000";
        assert!(check_event(&vector).is_err());
    }
}
