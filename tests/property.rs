use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wallet_engine::wallet::{
    check_receiver_address, derive_master_key, derive_seed, dictionary, generate_mnemonic_with,
    parse_mnemonic, receive_path, validate_mnemonic, WordCount,
};
use wallet_engine::Network;

fn any_word_count() -> impl Strategy<Value = WordCount> {
    prop_oneof![Just(WordCount::Twelve), Just(WordCount::TwentyFour)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn generated_phrases_parse_back(seed in any::<u64>(), count in any_word_count()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mnemonic = generate_mnemonic_with(&mut rng, count).unwrap();
        let phrase = mnemonic.phrase();

        prop_assert_eq!(mnemonic.word_count(), count.words());
        prop_assert!(validate_mnemonic(&phrase));
        let parsed = parse_mnemonic(&phrase.to_uppercase()).unwrap();
        prop_assert_eq!(parsed.words(), mnemonic.words());
    }

    #[test]
    fn flipped_checksum_bit_is_rejected(seed in any::<u64>(), count in any_word_count(), bit in 0u32..8) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mnemonic = generate_mnemonic_with(&mut rng, count).unwrap();
        // The last word ends in the checksum: 4 bits for 12 words, 8 for 24
        let checksum_bits = match count {
            WordCount::Twelve => 4,
            WordCount::TwentyFour => 8,
        };
        let bit = bit % checksum_bits;

        let indices = mnemonic.word_indices();
        let last = *indices.last().unwrap() as usize;
        let mut words = mnemonic.words();
        let flipped = dictionary()[last ^ (1 << bit)];
        *words.last_mut().unwrap() = flipped.to_string();

        prop_assert!(!validate_mnemonic(&words.join(" ")));
        prop_assert!(parse_mnemonic(&words.join(" ")).is_err());
    }

    #[test]
    fn seed_and_addresses_are_deterministic(seed in any::<u64>(), index in 0u32..1000) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mnemonic = generate_mnemonic_with(&mut rng, WordCount::Twelve).unwrap();

        let a = derive_master_key(&derive_seed(&mnemonic, "")).unwrap();
        let b = derive_master_key(&derive_seed(&mnemonic, "")).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());

        let address = a.receive_address(Network::Mainnet, 0, index).unwrap();
        let child = b.derive_child(&receive_path(Network::Mainnet, 0, index)).unwrap();
        prop_assert_eq!(address.to_string(), child.address(Network::Mainnet).to_string());
        prop_assert!(check_receiver_address(&address.to_string(), Network::Mainnet));
        prop_assert!(!check_receiver_address(&address.to_string(), Network::Testnet));
    }

    #[test]
    fn corrupted_addresses_are_rejected(seed in any::<u64>(), pos in 1usize..25, replace in 0usize..58) {
        const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
        let mut rng = StdRng::seed_from_u64(seed);
        let mnemonic = generate_mnemonic_with(&mut rng, WordCount::Twelve).unwrap();
        let master = derive_master_key(&derive_seed(&mnemonic, "")).unwrap();
        let address = master.receive_address(Network::Mainnet, 0, 0).unwrap().to_string();

        let mut bytes = address.clone().into_bytes();
        let pos = pos % bytes.len();
        prop_assume!(bytes[pos] != ALPHABET[replace]);
        bytes[pos] = ALPHABET[replace];
        let corrupted = String::from_utf8(bytes).unwrap();

        prop_assert!(!check_receiver_address(&corrupted, Network::Mainnet));
    }
}
