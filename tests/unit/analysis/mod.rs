mod test_llm_fallback;
